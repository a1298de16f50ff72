//! # Routes
//!
//! Axum router configuration for the webhook service.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main application router
///
/// Routes:
/// - GET  /health - Health check
/// - POST /api/webhooks/cielo - Cielo webhook delivery
/// - GET  /api/webhooks/cielo/config - Registration descriptor
pub fn create_router(state: AppState) -> Router {
    // Webhook routes (no CORS, must accept raw body)
    let webhook_routes = Router::new()
        .route("/cielo", post(handlers::cielo_webhook))
        .route("/cielo/config", get(handlers::webhook_configuration));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/webhooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
