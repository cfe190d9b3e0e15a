//! Provider abstractions for the managed RAG service and object storage
//!
//! Handlers and the model initializer only see these traits; the GCP
//! implementations live in [`gcp`] behind the `gcp` feature.

pub mod object_store;
pub mod rag;

#[cfg(feature = "gcp")]
pub mod gcp;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use object_store::{storage_uri, ObjectStore};
pub use rag::{ChatModel, RagService};
