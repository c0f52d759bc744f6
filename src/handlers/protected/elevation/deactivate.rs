// handlers/protected/elevation/deactivate.rs - POST /api/elevation/deactivate handler

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/**
 * POST /api/elevation/deactivate - Close the privilege window early
 *
 * Mounted behind require_grant_middleware. Runs the same revert-and-unlock
 * routine as the automatic rollback.
 */
pub async fn deactivate_post(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult {
    ApiResponse::<Value>::from_outcome(state.service.deactivate(&user.session_id).await)
}
