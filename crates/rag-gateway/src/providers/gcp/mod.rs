//! Google Cloud Platform provider implementations
//!
//! - Vertex AI RAG Engine for corpus lookup and file ingestion
//! - Gemini via Vertex AI for retrieval-grounded chat
//! - Google Cloud Storage for uploaded documents

mod auth;
mod gcs_store;
mod gemini_client;
mod vertex_rag;

use std::sync::Arc;

pub use auth::GcpAuth;
pub use gcs_store::GcsObjectStore;
pub use gemini_client::GeminiRagModel;
pub use vertex_rag::VertexRagClient;

use crate::config::GcpConfig;
use crate::error::Result;

/// Vertex AI REST base URL for a region
fn vertex_base_url(location: &str) -> String {
    format!("https://{}-aiplatform.googleapis.com/v1", location)
}

/// GCP clients sharing one set of credentials
pub struct GcpBackend {
    pub auth: Arc<GcpAuth>,
    pub rag: Arc<VertexRagClient>,
    pub object_store: Arc<GcsObjectStore>,
}

impl GcpBackend {
    /// Build the clients without contacting Google.
    ///
    /// A configured service account key is used by both Vertex AI and Cloud
    /// Storage; otherwise both fall back to the environment's credentials.
    pub fn from_config(gcp: &GcpConfig) -> Result<Self> {
        let key_path = gcp.service_account_key_path.as_deref();
        let auth = Arc::new(GcpAuth::from_config(key_path, gcp.project_id.clone())?);

        let rag = Arc::new(VertexRagClient::new(Arc::clone(&auth), gcp.location.clone()));

        let mut object_store =
            GcsObjectStore::new(gcp.project_id.clone(), gcp.bucket(), gcp.location.clone());
        if let Some(path) = key_path {
            object_store = object_store.with_credentials_file(path);
        }

        Ok(Self {
            auth,
            rag,
            object_store: Arc::new(object_store),
        })
    }
}
