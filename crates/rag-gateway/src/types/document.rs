//! Uploaded document

use bytes::Bytes;
use std::path::Path;

/// A file received on `POST /upload`, forwarded straight to the object store
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Original filename, without any client-side directories
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedDocument {
    /// Build from a multipart part. Returns `None` when the filename is unusable.
    pub fn new(raw_filename: &str, content_type: Option<&str>, data: Bytes) -> Option<Self> {
        let filename = Path::new(raw_filename.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .filter(|name| !name.is_empty())?;

        let content_type = content_type
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });

        Some(Self {
            filename,
            content_type,
            data,
        })
    }

    /// Object key under `prefix`. Same filename means same key.
    pub fn object_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_directories_are_dropped() {
        let doc = UploadedDocument::new("reports/q3/summary.pdf", None, Bytes::new()).unwrap();
        assert_eq!(doc.filename, "summary.pdf");
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.object_key("uploads/"), "uploads/summary.pdf");
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let doc = UploadedDocument::new("notes", Some("text/markdown"), Bytes::new()).unwrap();
        assert_eq!(doc.content_type, "text/markdown");
    }

    #[test]
    fn test_empty_filename_is_rejected() {
        assert!(UploadedDocument::new("", None, Bytes::new()).is_none());
        assert!(UploadedDocument::new("   ", None, Bytes::new()).is_none());
    }
}
