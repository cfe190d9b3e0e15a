//! Core types for the gateway

pub mod conversation;
pub mod corpus;
pub mod document;
pub mod response;

pub use conversation::{ChatRequest, ConversationTurn, Role};
pub use corpus::{ImportSummary, RagCorpus, RetrievalTool};
pub use document::UploadedDocument;
pub use response::{ChatResponse, UploadResponse};
