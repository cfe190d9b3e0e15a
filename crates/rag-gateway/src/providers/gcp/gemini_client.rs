//! Gemini client for retrieval-grounded chat via Vertex AI

use async_trait::async_trait;
use std::sync::Arc;

use super::auth::GcpAuth;
use super::vertex_base_url;
use crate::error::{Error, Result};
use crate::providers::rag::ChatModel;
use crate::types::{ConversationTurn, RetrievalTool};

/// Gemini model bound to a RAG retrieval tool
pub struct GeminiRagModel {
    auth: Arc<GcpAuth>,
    http: reqwest::Client,
    location: String,
    model: String,
    tool: RetrievalTool,
}

impl GeminiRagModel {
    /// Create a new Gemini model handle
    ///
    /// # Arguments
    /// * `auth` - GCP authentication
    /// * `location` - GCP region (e.g., "us-central1")
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    /// * `tool` - Retrieval tool every request is grounded with
    pub fn new(
        auth: Arc<GcpAuth>,
        http: reqwest::Client,
        location: String,
        model: String,
        tool: RetrievalTool,
    ) -> Self {
        Self {
            auth,
            http,
            location,
            model,
            tool,
        }
    }

    /// Get the API endpoint URL
    fn endpoint(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            vertex_base_url(&self.location),
            self.auth.project_id(),
            self.location,
            self.model
        )
    }

    fn build_request<'a>(&'a self, history: &'a [ConversationTurn]) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: history
                .iter()
                .map(|turn| Content {
                    role: turn.role.as_str(),
                    parts: vec![Part { text: &turn.text }],
                })
                .collect(),
            tools: vec![&self.tool],
        }
    }
}

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<&'a RetrievalTool>,
}

#[derive(serde::Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, or `EmptyGeneration` with the best reason available
    fn into_text(self) -> Result<String> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(Error::EmptyGeneration {
                reason: block_reason.unwrap_or_else(|| "no candidates".to_string()),
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::EmptyGeneration {
                reason: block_reason
                    .or(candidate.finish_reason)
                    .unwrap_or_else(|| "no text".to_string()),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatModel for GeminiRagModel {
    async fn generate(&self, history: &[ConversationTurn]) -> Result<String> {
        let token = self.auth.get_token().await?;
        let request = self.build_request(history);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }

        let gen_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse Gemini response: {}", e)))?;

        gen_response.into_text()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
