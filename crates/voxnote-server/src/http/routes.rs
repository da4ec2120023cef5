use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Uploads above this size are rejected before reaching the pipeline.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/config",
            get(handlers::get_config)
                .put(handlers::update_config)
                .post(handlers::reset_config),
        )
        .route(
            "/history",
            get(handlers::list_history).delete(handlers::delete_history),
        )
        .route("/process", post(handlers::process_audio))
        .route("/record/toggle", post(handlers::toggle_recording))
        .route("/record/state", get(handlers::session_state))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
