//! Object store trait for uploaded documents

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Trait for the bucket uploads are written to
///
/// Implementations:
/// - `GcsObjectStore`: Google Cloud Storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Make sure the bucket exists, creating it if needed
    async fn ensure_bucket(&self) -> Result<()>;

    /// Store `data` under `key`, replacing any existing object.
    ///
    /// Returns the storage URI
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;

    /// Bucket name
    fn bucket(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// `gs://` URI for an object
pub fn storage_uri(bucket: &str, key: &str) -> String {
    format!("gs://{}/{}", bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_uri() {
        assert_eq!(
            storage_uri("demo-uploads", "docs/handbook.pdf"),
            "gs://demo-uploads/docs/handbook.pdf"
        );
    }
}
