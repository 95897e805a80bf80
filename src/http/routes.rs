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
        // Session control
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/stop/:session_id", post(handlers::stop_session))
        .route("/sessions/active", get(handlers::get_active_session))
        // Audio push
        .route("/sessions/:session_id/audio", post(handlers::push_audio))
        // Diagnostics
        .route(
            "/sessions/:session_id/diagnostics",
            get(handlers::get_diagnostics),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
