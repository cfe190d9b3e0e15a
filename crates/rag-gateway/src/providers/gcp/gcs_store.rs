//! Google Cloud Storage object store
//!
//! Uploaded files land here before the RAG service ingests them.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::buckets::insert::{
    BucketCreationConfig, InsertBucketParam, InsertBucketRequest,
};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;

use crate::error::{Error, Result};
use crate::providers::object_store::{storage_uri, ObjectStore};

/// Google Cloud Storage object store
///
/// The client is created on first use, so missing credentials surface as a
/// storage error on upload instead of stopping the process at startup.
pub struct GcsObjectStore {
    client: OnceCell<GcsClient>,
    /// Service account key; application default credentials when `None`
    credentials_path: Option<PathBuf>,
    bucket: String,
    project_id: String,
    /// Bucket location used if the bucket has to be created
    location: String,
    bucket_ready: OnceCell<()>,
}

impl GcsObjectStore {
    /// Create a new GCS object store
    ///
    /// # Arguments
    /// * `project_id` - project that owns the bucket when it has to be created
    /// * `bucket` - GCS bucket name
    /// * `location` - GCP region for a newly created bucket
    pub fn new(project_id: String, bucket: String, location: String) -> Self {
        Self {
            client: OnceCell::new(),
            credentials_path: None,
            bucket,
            project_id,
            location,
            bucket_ready: OnceCell::new(),
        }
    }

    /// Authenticate with a service account key file
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Key file the client authenticates with, if any
    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials_path.as_deref()
    }

    async fn client(&self) -> Result<&GcsClient> {
        self.client
            .get_or_try_init(|| async {
                let config = match &self.credentials_path {
                    Some(path) => {
                        let credentials = CredentialsFile::new_from_file(
                            path.display().to_string(),
                        )
                        .await
                        .map_err(|e| {
                            Error::storage(format!(
                                "Failed to read service account key {}: {}",
                                path.display(),
                                e
                            ))
                        })?;
                        ClientConfig::default()
                            .with_credentials(credentials)
                            .await
                            .map_err(|e| {
                                Error::storage(format!("Failed to create GCS client: {}", e))
                            })?
                    }
                    // Application default credentials: key file or metadata server
                    None => ClientConfig::default().with_auth().await.map_err(|e| {
                        Error::storage(format!("Failed to create GCS client: {}", e))
                    })?,
                };
                tracing::debug!("GCS client created for bucket {}", self.bucket);
                Ok(GcsClient::new(config))
            })
            .await
    }

    async fn create_bucket(&self) -> Result<()> {
        tracing::info!(
            "Bucket {} not found, creating it in {}",
            self.bucket,
            self.location
        );

        let request = InsertBucketRequest {
            name: self.bucket.clone(),
            param: InsertBucketParam {
                project: self.project_id.clone(),
                ..Default::default()
            },
            bucket: BucketCreationConfig {
                location: self.location.to_uppercase(),
                ..Default::default()
            },
        };

        match self.client().await?.insert_bucket(&request).await {
            Ok(_) => Ok(()),
            // Lost a creation race with another instance
            Err(GcsError::Response(e)) if e.code == 409 => Ok(()),
            Err(e) => Err(Error::storage(format!(
                "Failed to create bucket {}: {}",
                self.bucket, e
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn ensure_bucket(&self) -> Result<()> {
        self.bucket_ready
            .get_or_try_init(|| async {
                let client = self.client().await?;
                let request = GetBucketRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                };

                match client.get_bucket(&request).await {
                    Ok(_) => Ok(()),
                    Err(GcsError::Response(e)) if e.code == 404 => self.create_bucket().await,
                    Err(e) => Err(Error::storage(format!(
                        "Failed to look up bucket {}: {}",
                        self.bucket, e
                    ))),
                }
            })
            .await
            .map(|_| ())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        let mut media = Media::new(key.to_string());
        media.content_type = content_type.to_string().into();
        let upload_type = UploadType::Simple(media);
        let size = data.len();

        self.client()
            .await?
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &upload_type,
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to upload {} to GCS: {}", key, e)))?;

        let uri = storage_uri(&self.bucket, key);
        tracing::info!("Stored {} ({} bytes)", uri, size);
        Ok(uri)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        "gcs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GcsObjectStore {
        GcsObjectStore::new(
            "demo-project".to_string(),
            "demo-uploads".to_string(),
            "us-central1".to_string(),
        )
    }

    #[test]
    fn test_new_does_not_authenticate() {
        let store = store();
        assert!(store.client.get().is_none());
        assert!(store.credentials_path().is_none());
        assert_eq!(store.bucket(), "demo-uploads");
    }

    #[tokio::test]
    async fn test_unreadable_key_is_storage_error() {
        let store = store().with_credentials_file("/nonexistent/sa.json");

        let err = store.ensure_bucket().await.unwrap_err();
        assert!(matches!(err, Error::Storage(ref message) if message.contains("/nonexistent/sa.json")));
        assert!(store.client.get().is_none());
    }
}
