//! Configuration for the gateway

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Google Cloud configuration
    #[serde(default)]
    pub gcp: GcpConfig,
    /// Outbound call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Model initialization policy
    #[serde(default)]
    pub init: InitConfig,
}

impl GatewayConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Override values from the environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(project) = lookup("GCP_PROJECT_ID").or_else(|| lookup("GOOGLE_CLOUD_PROJECT"))
        {
            self.gcp.project_id = project;
        }
        if let Some(location) = lookup("GCP_LOCATION") {
            self.gcp.location = location;
        }
        if let Some(corpus) = lookup("RAG_CORPUS_DISPLAY_NAME") {
            self.gcp.corpus_display_name = corpus;
        }
        if let Some(bucket) = lookup("GCS_BUCKET") {
            self.gcp.bucket_name = Some(bucket);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gcp.model_name = model;
        }
        if let Some(key_path) = lookup("GOOGLE_APPLICATION_CREDENTIALS") {
            self.gcp.service_account_key_path = Some(PathBuf::from(key_path));
        }
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.gcp.project_id.trim().is_empty() {
            return Err(Error::Config(
                "gcp.project_id is required (or set GCP_PROJECT_ID)".to_string(),
            ));
        }
        if self.gcp.corpus_display_name.trim().is_empty() {
            return Err(Error::Config(
                "gcp.corpus_display_name must not be empty".to_string(),
            ));
        }
        if self.gcp.model_name.trim().is_empty() {
            return Err(Error::Config("gcp.model_name must not be empty".to_string()));
        }
        for (name, secs) in [
            ("timeouts.setup_secs", self.timeouts.setup_secs),
            ("timeouts.generation_secs", self.timeouts.generation_secs),
            ("timeouts.storage_secs", self.timeouts.storage_secs),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
    /// Landing page served at `/`
    pub index_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
            index_path: PathBuf::from("static/index.html"),
        }
    }
}

/// Google Cloud configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// GCP project ID
    #[serde(default)]
    pub project_id: String,
    /// GCP region (e.g., "us-central1")
    #[serde(default = "default_location")]
    pub location: String,
    /// Display name of the RAG corpus to chat against and ingest into
    #[serde(default = "default_corpus_display_name")]
    pub corpus_display_name: String,
    /// GCS bucket for uploads (default: "{project_id}-rag-uploads")
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Object prefix for uploaded files
    #[serde(default)]
    pub upload_prefix: String,
    /// Generation model (default: "gemini-2.5-flash")
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Service account JSON key; when unset the metadata server is used
    #[serde(default)]
    pub service_account_key_path: Option<PathBuf>,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_corpus_display_name() -> String {
    "SprintAssist-corpus-1".to_string()
}

fn default_model_name() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            corpus_display_name: default_corpus_display_name(),
            bucket_name: None,
            upload_prefix: String::new(),
            model_name: default_model_name(),
            service_account_key_path: None,
        }
    }
}

impl GcpConfig {
    /// Bucket used for uploads
    pub fn bucket(&self) -> String {
        match &self.bucket_name {
            Some(bucket) if !bucket.trim().is_empty() => bucket.clone(),
            _ => format!("{}-rag-uploads", self.project_id),
        }
    }
}

/// Outbound call timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Whole remote setup sequence (default: 60s)
    #[serde(default = "default_setup_timeout")]
    pub setup_secs: u64,
    /// Single generateContent call (default: 60s)
    #[serde(default = "default_generation_timeout")]
    pub generation_secs: u64,
    /// Each storage or ingestion step of an upload (default: 300s)
    #[serde(default = "default_storage_timeout")]
    pub storage_secs: u64,
}

fn default_setup_timeout() -> u64 { 60 }
fn default_generation_timeout() -> u64 { 60 }
fn default_storage_timeout() -> u64 { 300 }

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            setup_secs: default_setup_timeout(),
            generation_secs: default_generation_timeout(),
            storage_secs: default_storage_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn setup(&self) -> Duration {
        Duration::from_secs(self.setup_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }
}

/// Model initialization policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Start initialization in the background at startup instead of on first request
    #[serde(default)]
    pub eager: bool,
    /// Setup attempts before failure becomes terminal (0 = retry forever)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff after the first failure, doubled per attempt
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 { 5 }
fn default_initial_backoff() -> u64 { 1_000 }
fn default_max_backoff() -> u64 { 60_000 }

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            eager: false,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl InitConfig {
    /// Backoff to wait after `attempts` consecutive failures
    pub fn backoff_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Whether another attempt is allowed after `attempts` failures
    pub fn may_retry(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }
}
