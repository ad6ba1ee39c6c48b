//! API route modules.
//!
//! Organizes routes by resource type.

pub mod downloads;
pub mod health;
pub mod jobs;
pub mod logging;
pub mod summarize;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(downloads::router())
        .merge(summarize::router())
        .merge(jobs::router())
        .nest("/logging", logging::router());

    Router::new()
        .nest("/api", api)
        .nest("/health", health::router())
        .with_state(state)
}
