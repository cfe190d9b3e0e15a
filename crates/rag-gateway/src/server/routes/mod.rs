//! Routes for the gateway

pub mod chat;
pub mod pages;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/test", get(pages::test_marker))
        .route("/health", get(pages::health_check))
        .route("/ready", get(pages::readiness))
        .route("/chat", post(chat::chat))
        // Uploads get a larger body limit
        .route(
            "/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}
