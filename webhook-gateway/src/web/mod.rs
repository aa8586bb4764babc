//! HTTP ingress for inbound webhooks.
//!
//! Routes:
//! - `POST /webhooks?service=<provider>`: run the webhook pipeline
//! - `OPTIONS /webhooks`: CORS preflight
//! - `GET /health`: liveness

pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, preflight, webhook, AppState, HealthResponse};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks", post(webhook).options(preflight))
        .layer(middleware::map_response(handlers::cors_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
