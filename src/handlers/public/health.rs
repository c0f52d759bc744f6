// handlers/public/health.rs - GET / and GET /health handlers

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// GET / - Service name, version and route overview
pub async fn root_get() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Enginex Panel elevation service",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "challenge": "POST /api/elevation/challenge (protected)",
                "verify": "POST /api/elevation/verify (protected)",
                "activate": "POST /api/elevation/activate (protected)",
                "status": "GET /api/elevation/status (protected)",
                "grant": "DELETE /api/elevation/grant (protected)",
                "deactivate": "POST /api/elevation/deactivate (protected, grant required)",
            }
        }
    }))
}

/// GET /health - Liveness plus store reachability
pub async fn health_get(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.service.database().health_check() {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok"
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            ApiError::service_unavailable("database unavailable").into_response()
        }
    }
}
