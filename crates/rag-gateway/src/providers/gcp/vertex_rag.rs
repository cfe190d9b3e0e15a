//! Vertex AI RAG Engine client
//!
//! Lists corpora, hands out Gemini models grounded on a corpus, and imports
//! Cloud Storage objects into a corpus.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

use super::auth::GcpAuth;
use super::gemini_client::GeminiRagModel;
use super::vertex_base_url;
use crate::error::{Error, Result};
use crate::providers::rag::{ChatModel, RagService};
use crate::types::{ImportSummary, RagCorpus, RetrievalTool};

/// Vertex AI RAG Engine client
pub struct VertexRagClient {
    auth: Arc<GcpAuth>,
    http: reqwest::Client,
    location: String,
    /// Delay between polls of a long-running import
    poll_interval: Duration,
}

impl VertexRagClient {
    /// Create a new RAG Engine client
    ///
    /// # Arguments
    /// * `auth` - GCP authentication
    /// * `location` - GCP region (e.g., "us-central1")
    pub fn new(auth: Arc<GcpAuth>, location: String) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            location,
            poll_interval: Duration::from_secs(2),
        }
    }

    fn parent(&self) -> String {
        format!(
            "projects/{}/locations/{}",
            self.auth.project_id(),
            self.location
        )
    }

    fn corpora_url(&self) -> String {
        format!("{}/{}/ragCorpora", vertex_base_url(&self.location), self.parent())
    }

    fn import_url(&self, corpus: &RagCorpus) -> String {
        format!(
            "{}/{}/ragFiles:import",
            vertex_base_url(&self.location),
            corpus.name
        )
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", vertex_base_url(&self.location), operation)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let token = self.auth.get_token().await?;
        let response = self
            .http
            .get(self.operation_url(name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::storage(format!("Import status request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!(
                "Import status request failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::storage(format!("Failed to parse import operation: {}", e)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCorporaResponse {
    #[serde(default)]
    rag_corpora: Vec<RagCorpus>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<ImportRagFilesResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRagFilesResponse {
    #[serde(default, deserialize_with = "int64")]
    imported_rag_files_count: u64,
    #[serde(default, deserialize_with = "int64")]
    skipped_rag_files_count: u64,
    #[serde(default, deserialize_with = "int64")]
    failed_rag_files_count: u64,
}

impl Operation {
    /// Summary of a finished import operation
    fn into_summary(self) -> Result<ImportSummary> {
        if let Some(error) = self.error {
            return Err(Error::storage(format!(
                "Import failed ({}): {}",
                error.code, error.message
            )));
        }
        let response = self.response.unwrap_or_default();
        Ok(ImportSummary {
            imported: response.imported_rag_files_count,
            skipped: response.skipped_rag_files_count,
            failed: response.failed_rag_files_count,
        })
    }
}

/// Google APIs encode int64 as JSON strings
fn int64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[async_trait]
impl RagService for VertexRagClient {
    async fn connect(&self) -> Result<()> {
        self.auth.get_token().await.map(|_| ())
    }

    async fn list_corpora(&self) -> Result<Vec<RagCorpus>> {
        let mut corpora = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.get_token().await?;
            let mut request = self.http.get(self.corpora_url()).bearer_auth(token);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response = request.send().await.map_err(|e| {
                Error::InitializationFailure(format!("List corpora request failed: {}", e))
            })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::InitializationFailure(format!(
                    "List corpora failed ({}): {}",
                    status, body
                )));
            }

            let page: ListCorporaResponse = response.json().await.map_err(|e| {
                Error::InitializationFailure(format!("Failed to parse corpora list: {}", e))
            })?;

            corpora.extend(page.rag_corpora);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(corpora)
    }

    fn chat_model(&self, model: &str, tool: RetrievalTool) -> Result<Arc<dyn ChatModel>> {
        tracing::debug!(
            "Grounding {} on {}",
            model,
            tool.corpora().collect::<Vec<_>>().join(", ")
        );
        Ok(Arc::new(GeminiRagModel::new(
            Arc::clone(&self.auth),
            self.http.clone(),
            self.location.clone(),
            model.to_string(),
            tool,
        )))
    }

    async fn import_files(&self, corpus: &RagCorpus, uris: &[String]) -> Result<ImportSummary> {
        let token = self.auth.get_token().await?;
        let body = serde_json::json!({
            "importRagFilesConfig": {
                "gcsSource": { "uris": uris }
            }
        });

        let response = self
            .http
            .post(self.import_url(corpus))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::storage(format!("Import request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!(
                "Import into {} failed ({}): {}",
                corpus.display_name, status, body
            )));
        }

        let mut operation: Operation = response
            .json()
            .await
            .map_err(|e| Error::storage(format!("Failed to parse import operation: {}", e)))?;

        tracing::info!(
            "Import of {} file(s) into '{}' started ({})",
            uris.len(),
            corpus.display_name,
            operation.name
        );

        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            operation = self.get_operation(&operation.name).await?;
        }

        let summary = operation.into_summary()?;
        tracing::info!(
            "Import into '{}' finished: {} imported, {} skipped, {} failed",
            corpus.display_name,
            summary.imported,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn name(&self) -> &str {
        "vertex-rag"
    }
}
