//! Landing page and probe endpoints

use axum::{extract::State, http::StatusCode, response::Html, Json};

use crate::error::{Error, Result};
use crate::init::InitStatus;
use crate::server::state::AppState;

/// GET / - serve the landing page
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let path = &state.config().server.index_path;
    match tokio::fs::read_to_string(path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::AssetNotFound(path.display().to_string()))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// GET /test - plaintext liveness marker
pub async fn test_marker() -> &'static str {
    "OK"
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /ready - model readiness, without triggering initialization
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<InitStatus>) {
    let status = state.initializer().status();
    let code = if matches!(status, InitStatus::Ready { .. }) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
