use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::elevation::ElevationService;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, require_grant_middleware};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: ElevationService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(service: ElevationService, jwt_secret: &str) -> Self {
        Self {
            service,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

pub fn app(state: AppState, security: &SecurityConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .merge(elevation_routes(state.clone()))
        .fallback(|| async { ApiError::not_found("Route not found") })
        .with_state(state);

    if let Some(cors) = cors_layer(security) {
        router = router.layer(cors);
    }
    router.layer(TraceLayer::new_for_http())
}

fn elevation_routes(state: AppState) -> Router<AppState> {
    // Protected actions of the panel sit behind the grant gate
    let granted = Router::new()
        .route("/api/elevation/deactivate", post(protected::deactivate_post))
        .route_layer(from_fn_with_state(state.clone(), require_grant_middleware));

    Router::new()
        .route("/api/elevation/challenge", post(protected::challenge_post))
        .route("/api/elevation/verify", post(protected::verify_post))
        .route("/api/elevation/activate", post(protected::activate_post))
        .route("/api/elevation/status", get(protected::status_get))
        .route("/api/elevation/grant", delete(protected::grant_delete))
        .merge(granted)
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    Some(CorsLayer::permissive().allow_origin(AllowOrigin::list(origins)))
}
