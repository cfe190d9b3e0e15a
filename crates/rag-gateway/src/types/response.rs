//! Response bodies

use serde::{Deserialize, Serialize};

use super::corpus::ImportSummary;

/// Body of a successful `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of a successful `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    /// Storage URI handed to the ingestion call
    pub uri: String,
    pub imported_count: u64,
    pub skipped_count: u64,
}

impl UploadResponse {
    pub fn new(filename: &str, uri: String, summary: ImportSummary) -> Self {
        Self {
            message: format!(
                "File '{}' uploaded and ingested. Imported: {}, Skipped: {}",
                filename, summary.imported, summary.skipped
            ),
            uri,
            imported_count: summary.imported,
            skipped_count: summary.skipped,
        }
    }
}
