// handlers/protected/elevation/verify.rs - POST /api/elevation/verify handler

use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

/**
 * POST /api/elevation/verify - Consume a challenge code for the caller's session
 *
 * Wrong, malformed, expired, replayed and foreign codes all produce the same
 * 400 "Invalid or expired code".
 */
pub async fn verify_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let outcome = state.service.verify_challenge(&user.session_id, &request.code).await;
    ApiResponse::<Value>::from_outcome(outcome)
}
