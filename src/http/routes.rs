use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Device queries
        .route("/devices", get(handlers::list_devices))
        .route("/devices/:device_id", get(handlers::get_device))
        .route("/devices/:device_id/command", post(handlers::send_device_command))
        // Reassembly
        .route("/streams", get(handlers::stream_stats))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
