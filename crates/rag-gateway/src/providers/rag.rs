//! Managed RAG service traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ConversationTurn, ImportSummary, RagCorpus, RetrievalTool};

/// A generative model grounded by a retrieval tool
///
/// Implementations:
/// - `GeminiRagModel`: Gemini via Vertex AI `generateContent`
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next model turn for an ordered conversation history.
    ///
    /// Returns `Error::EmptyGeneration` when the service answers without text.
    async fn generate(&self, history: &[ConversationTurn]) -> Result<String>;

    /// Get the model being used
    fn model(&self) -> &str;
}

/// Client for the managed RAG service
///
/// Implementations:
/// - `VertexRagClient`: Vertex AI RAG Engine
#[async_trait]
pub trait RagService: Send + Sync {
    /// Establish credentials for subsequent calls
    async fn connect(&self) -> Result<()>;

    /// List every corpus visible to the configured project
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>>;

    /// Construct a model handle that retrieves through `tool`
    fn chat_model(&self, model: &str, tool: RetrievalTool) -> Result<Arc<dyn ChatModel>>;

    /// Ingest stored objects into `corpus`, waiting for the import to finish
    async fn import_files(&self, corpus: &RagCorpus, uris: &[String]) -> Result<ImportSummary>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
