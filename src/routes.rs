use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Create file host routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        // Landing page
        .route("/", get(handlers::home))
        // Health check
        .route("/health", get(handlers::health))
        // Listing and download
        .route("/files", get(handlers::list_files))
        .route("/file/:identifier", get(handlers::get_file))
}

/// Full application router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(file_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
