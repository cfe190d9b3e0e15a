//! Application state for the gateway server

use std::sync::Arc;

use crate::config::GatewayConfig;
#[cfg(feature = "gcp")]
use crate::error::Result;
use crate::init::ModelInitializer;
use crate::providers::{ObjectStore, RagService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: GatewayConfig,
    /// Managed RAG service (corpus lookup, ingestion)
    rag: Arc<dyn RagService>,
    /// Bucket uploads are written to
    object_store: Arc<dyn ObjectStore>,
    /// Lazily initialized chat model
    initializer: Arc<ModelInitializer>,
}

impl AppState {
    /// Create application state backed by Vertex AI and Cloud Storage
    #[cfg(feature = "gcp")]
    ///
    /// Nothing is contacted here: credentials are first used by model setup
    /// and by the first upload.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        use crate::providers::gcp::GcpBackend;

        let gcp = &config.gcp;
        tracing::info!(
            "Using GCP backend (project: {}, location: {}, credentials: {})",
            gcp.project_id,
            gcp.location,
            gcp.service_account_key_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "application default".to_string())
        );

        let backend = GcpBackend::from_config(gcp)?;
        Ok(Self::from_parts(config, backend.rag, backend.object_store))
    }

    /// Create application state from explicit providers
    pub fn from_parts(
        config: GatewayConfig,
        rag: Arc<dyn RagService>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let initializer = Arc::new(ModelInitializer::new(
            Arc::clone(&rag),
            config.gcp.corpus_display_name.clone(),
            config.gcp.model_name.clone(),
            config.init.clone(),
            config.timeouts.setup(),
        ));

        tracing::info!(
            "Object store: {} (bucket: {})",
            object_store.name(),
            object_store.bucket()
        );

        if config.server.index_path.is_file() {
            tracing::info!("Landing page: {}", config.server.index_path.display());
        } else {
            tracing::warn!(
                "Landing page not found at {}, GET / will return 404",
                config.server.index_path.display()
            );
        }

        Self {
            inner: Arc::new(AppStateInner {
                config,
                rag,
                object_store,
                initializer,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Get the RAG service client
    pub fn rag(&self) -> &Arc<dyn RagService> {
        &self.inner.rag
    }

    /// Get the object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.object_store
    }

    /// Get the model initializer
    pub fn initializer(&self) -> &Arc<ModelInitializer> {
        &self.inner.initializer
    }
}
