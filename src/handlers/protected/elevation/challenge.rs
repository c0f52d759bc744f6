// handlers/protected/elevation/challenge.rs - POST /api/elevation/challenge handler

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::elevation::DEFAULT_ACTION;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeRequest {
    pub action: Option<String>,
}

/**
 * POST /api/elevation/challenge - Issue a one-time code for the caller's session
 *
 * The code is delivered out-of-band and never appears in the response.
 * Body is optional; `action` defaults to "visudo".
 */
pub async fn challenge_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Option<Json<ChallengeRequest>>,
) -> ApiResult {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let action = request.action.as_deref().unwrap_or(DEFAULT_ACTION);
    if action != DEFAULT_ACTION {
        return Err(ApiError::bad_request(format!("Unknown action '{}'", action)));
    }

    let outcome = state.service.request_challenge(&user.session_id, action).await;
    ApiResponse::<Value>::from_outcome_with_status(outcome, StatusCode::CREATED)
}
