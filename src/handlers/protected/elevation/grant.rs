// handlers/protected/elevation/grant.rs - DELETE /api/elevation/grant handler

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// DELETE /api/elevation/grant - Drop the caller's grant; idempotent
pub async fn grant_delete(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult {
    ApiResponse::<Value>::from_outcome(state.service.revoke_grant(&user.session_id).await)
}
