// handlers/protected/elevation/status.rs - GET /api/elevation/status handler

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/elevation/status - Caller's grant plus the system-wide window
pub async fn status_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult {
    ApiResponse::<Value>::from_outcome(state.service.status(&user.session_id).await)
}
