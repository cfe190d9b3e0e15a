//! Error types for the gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client payload failed shape validation
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Upload without a usable `file` part
    #[error("No file provided: {0}")]
    MissingFile(String),

    /// Request body exceeds the configured upload limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// No corpus carries the configured display name
    #[error("RAG corpus '{0}' not found")]
    CorpusNotFound(String),

    /// Remote setup could not complete
    #[error("Model initialization failed: {0}")]
    InitializationFailure(String),

    /// The model is not available to this caller
    #[error("Model is not available: {0}")]
    ServiceUnavailable(String),

    /// Authentication / token exchange error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The model call reached the service but failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The model answered with no text
    #[error("Model returned an empty response ({reason})")]
    EmptyGeneration { reason: String },

    /// Bucket, object or ingestion failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Static asset missing
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a malformed request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Machine-readable error type used in response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::MalformedRequest(_) => "malformed_request",
            Error::MissingFile(_) => "missing_file",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::CorpusNotFound(_) => "corpus_not_found",
            Error::InitializationFailure(_) => "initialization_failure",
            Error::ServiceUnavailable(_) => "service_unavailable",
            Error::Auth(_) => "auth_error",
            Error::Generation(_) => "generation_failure",
            Error::EmptyGeneration { .. } => "empty_generation",
            Error::Storage(_) => "storage_failure",
            Error::AssetNotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MalformedRequest(_) | Error::MissingFile(_) | Error::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::AssetNotFound(_) => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::CorpusNotFound(_)
            | Error::InitializationFailure(_)
            | Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::EmptyGeneration { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_)
            | Error::Auth(_)
            | Error::Generation(_)
            | Error::Storage(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error_type = self.kind(), "{}", self);
        } else {
            tracing::debug!(error_type = self.kind(), "{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_faults_are_4xx() {
        assert_eq!(Error::malformed("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::MissingFile("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::AssetNotFound("index.html".into()).status(),
            StatusCode::NOT_FOUND
        );
        let too_large = Error::PayloadTooLarge("limit is 64 bytes".into());
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.kind(), "payload_too_large");
    }

    #[test]
    fn test_server_faults_are_5xx() {
        assert_eq!(
            Error::ServiceUnavailable("setup failed".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::generation("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::storage("bucket").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let empty = Error::EmptyGeneration {
            reason: "SAFETY".into(),
        };
        assert_eq!(empty.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(empty.kind(), "empty_generation");
        assert!(empty.to_string().contains("SAFETY"));
    }
}
