//! Chat endpoint

use axum::{body::Bytes, extract::State, Json};
use std::time::Instant;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ChatRequest, ChatResponse};

/// POST /chat - answer the last turn of a conversation from the corpus
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatResponse>> {
    // Validate before anything remote happens
    let request = ChatRequest::from_slice(&body)?;

    let handle = state.initializer().ensure_ready().await?;

    let start = Instant::now();
    let limit = state.config().timeouts.generation();
    let text = timeout(limit, handle.model().generate(&request.history))
        .await
        .map_err(|_| Error::generation(format!("model did not answer within {:?}", limit)))??;

    tracing::info!(
        "Chat answered in {:.2}s ({} turns, {} chars)",
        start.elapsed().as_secs_f64(),
        request.history.len(),
        text.len()
    );

    Ok(Json(ChatResponse { response: text }))
}
