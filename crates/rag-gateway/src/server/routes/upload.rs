//! Document upload endpoint

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{UploadResponse, UploadedDocument};

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

/// POST /upload - store a file and ingest it into the corpus
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|e| Error::MissingFile(format!("expected multipart form data: {}", e)))?;

    // Validate before anything remote happens
    let document = read_file_field(&mut multipart).await?;
    tracing::info!(
        "Received upload: {} ({} bytes, {})",
        document.filename,
        document.data.len(),
        document.content_type
    );

    let handle = state.initializer().ensure_ready().await?;

    let start = Instant::now();
    let limit = state.config().timeouts.storage();
    let store = state.object_store();
    let key = document.object_key(&state.config().gcp.upload_prefix);

    let uri = bounded(limit, "storing the file", async {
        store.ensure_bucket().await?;
        store
            .put_object(&key, document.data.clone(), &document.content_type)
            .await
    })
    .await?;

    let summary = bounded(
        limit,
        "ingesting the file",
        state.rag().import_files(handle.corpus(), std::slice::from_ref(&uri)),
    )
    .await?;

    tracing::info!(
        "Upload of {} finished in {:.2}s ({} imported, {} skipped)",
        document.filename,
        start.elapsed().as_secs_f64(),
        summary.imported,
        summary.skipped
    );

    Ok(Json(UploadResponse::new(&document.filename, uri, summary)))
}

/// Find the `file` part; other parts are ignored
async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedDocument> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file", e))?;

        return UploadedDocument::new(&filename, content_type.as_deref(), data)
            .ok_or_else(|| Error::MissingFile("no selected file".to_string()));
    }

    Err(Error::MissingFile(format!("no '{}' part in request", FILE_FIELD)))
}

/// Body limit hits are reported as 413, anything else as a malformed request
fn multipart_error(context: &str, e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(format!("{}: {}", context, e.body_text()))
    } else {
        Error::malformed(format!("{}: {}", context, e.body_text()))
    }
}

/// Run a storage step under a deadline
async fn bounded<T, F>(limit: Duration, step: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(limit, future)
        .await
        .map_err(|_| Error::storage(format!("timed out after {:?} {}", limit, step)))?
}
