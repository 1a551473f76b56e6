use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Uploads can legitimately reach the 50 MiB cap; axum's default body limit
/// is far below that, so raise it and let the store enforce the real maximum
const BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Pipeline invocation
        .route(
            "/observations/:subject_id/audio",
            post(handlers::process_audio),
        )
        // Stored records
        .route(
            "/observations/:subject_id",
            get(handlers::get_observations),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}
