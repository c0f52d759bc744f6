// handlers/protected/elevation/activate.rs - POST /api/elevation/activate handler

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/**
 * POST /api/elevation/activate - Enable temporary privileges
 *
 * Requires a verified, unexpired challenge for the session. On success the
 * privilege window is open, rollback is armed and the session holds a grant.
 *
 * 403 no verified challenge, 409 window already open (with remaining
 * seconds), 422 validator rejected the edited configuration.
 */
pub async fn activate_post(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult {
    let outcome = state.service.activate_privilege(&user.session_id, &user.user_id).await;
    ApiResponse::<Value>::from_outcome(outcome)
}
