//! rag-gateway: HTTP front door for a managed RAG corpus
//!
//! Proxies chat conversations to a Gemini model grounded on a Vertex AI RAG
//! corpus, and forwards uploaded files to Cloud Storage for ingestion into
//! that same corpus. The expensive remote handshake (resolve corpus, build the
//! retrieval tool, construct the model handle) is deferred to the first
//! request and guarded by [`init::ModelInitializer`].

pub mod config;
pub mod error;
pub mod init;
pub mod providers;
pub mod server;
pub mod types;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use init::{InitStatus, ModelHandle, ModelInitializer};
pub use types::{
    conversation::{ConversationTurn, Role},
    corpus::{ImportSummary, RagCorpus, RetrievalTool},
};
