//! In-memory providers for tests.
//!
//! Available in this crate's unit tests and, with the `test-utils` feature,
//! to integration tests:
//!
//! ```toml
//! [dev-dependencies]
//! rag-gateway = { path = ".", features = ["test-utils"] }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::object_store::{storage_uri, ObjectStore};
use super::rag::{ChatModel, RagService};
use crate::error::{Error, Result};
use crate::types::{ConversationTurn, ImportSummary, RagCorpus, RetrievalTool};

/// What the mock model answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with fixed text
    Text(String),
    /// Answer with no text, as a safety-filtered response would
    Empty(String),
    /// Fail the call
    Fail(String),
    /// Never answer
    Hang,
}

/// Shared call log of the mock RAG service and the models it hands out
#[derive(Debug, Default)]
pub struct MockCalls {
    setups: AtomicUsize,
    generations: Mutex<Vec<Vec<ConversationTurn>>>,
    imports: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockCalls {
    /// Number of remote setup sequences started (`list_corpora` calls)
    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    /// Histories passed to `generate`, in call order
    pub fn generations(&self) -> Vec<Vec<ConversationTurn>> {
        self.generations.lock().clone()
    }

    /// `(corpus name, uris)` passed to `import_files`
    pub fn imports(&self) -> Vec<(String, Vec<String>)> {
        self.imports.lock().clone()
    }
}

/// Mock RAG service
pub struct MockRagService {
    corpora: Vec<RagCorpus>,
    reply: MockReply,
    setup_delay: Duration,
    failing_setups: AtomicUsize,
    import_summary: ImportSummary,
    import_error: Option<String>,
    calls: Arc<MockCalls>,
}

impl MockRagService {
    /// Service exposing a single corpus with the given display name
    pub fn with_corpus(display_name: &str) -> Self {
        Self {
            corpora: vec![RagCorpus {
                name: format!("projects/test/locations/us-central1/ragCorpora/{}", display_name),
                display_name: display_name.to_string(),
            }],
            reply: MockReply::Text("mock answer".to_string()),
            setup_delay: Duration::ZERO,
            failing_setups: AtomicUsize::new(0),
            import_summary: ImportSummary {
                imported: 1,
                skipped: 0,
                failed: 0,
            },
            import_error: None,
            calls: Arc::new(MockCalls::default()),
        }
    }

    /// Service with no corpora at all, so setup fails with `CorpusNotFound`
    pub fn without_corpora() -> Self {
        Self {
            corpora: Vec::new(),
            ..Self::with_corpus("unused")
        }
    }

    pub fn reply(mut self, reply: MockReply) -> Self {
        self.reply = reply;
        self
    }

    /// Delay each setup so concurrent callers overlap
    pub fn setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = delay;
        self
    }

    /// Fail the first `count` setups with a transient error
    pub fn failing_setups(self, count: usize) -> Self {
        self.failing_setups.store(count, Ordering::SeqCst);
        self
    }

    pub fn import_summary(mut self, summary: ImportSummary) -> Self {
        self.import_summary = summary;
        self
    }

    /// Reject every ingestion with `message`
    pub fn failing_import(mut self, message: &str) -> Self {
        self.import_error = Some(message.to_string());
        self
    }

    /// Call log, still readable after the service is moved into an `Arc<dyn RagService>`
    pub fn calls(&self) -> Arc<MockCalls> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl RagService for MockRagService {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn list_corpora(&self) -> Result<Vec<RagCorpus>> {
        self.calls.setups.fetch_add(1, Ordering::SeqCst);
        if !self.setup_delay.is_zero() {
            tokio::time::sleep(self.setup_delay).await;
        }
        let remaining = self.failing_setups.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_setups.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::InitializationFailure(
                "transient network failure".to_string(),
            ));
        }
        Ok(self.corpora.clone())
    }

    fn chat_model(&self, model: &str, _tool: RetrievalTool) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(MockChatModel {
            model: model.to_string(),
            reply: self.reply.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }

    async fn import_files(&self, corpus: &RagCorpus, uris: &[String]) -> Result<ImportSummary> {
        self.calls
            .imports
            .lock()
            .push((corpus.name.clone(), uris.to_vec()));
        match &self.import_error {
            Some(message) => Err(Error::storage(message.clone())),
            None => Ok(self.import_summary),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockChatModel {
    model: String,
    reply: MockReply,
    calls: Arc<MockCalls>,
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, history: &[ConversationTurn]) -> Result<String> {
        self.calls.generations.lock().push(history.to_vec());
        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Empty(reason) => Err(Error::EmptyGeneration {
                reason: reason.clone(),
            }),
            MockReply::Fail(message) => Err(Error::generation(message.clone())),
            MockReply::Hang => std::future::pending().await,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Mock object store keeping uploads in memory
pub struct MockObjectStore {
    bucket: String,
    fail_writes: bool,
    hang_writes: bool,
    ensure_calls: AtomicUsize,
    objects: Mutex<Vec<(String, Bytes, String)>>,
}

impl MockObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            fail_writes: false,
            hang_writes: false,
            ensure_calls: AtomicUsize::new(0),
            objects: Mutex::new(Vec::new()),
        }
    }

    /// Store whose writes always fail
    pub fn failing(bucket: &str) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(bucket)
        }
    }

    /// Store whose writes never complete
    pub fn hanging(bucket: &str) -> Self {
        Self {
            hang_writes: true,
            ..Self::new(bucket)
        }
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    /// `(key, data, content type)` of every write, in order
    pub fn objects(&self) -> Vec<(String, Bytes, String)> {
        self.objects.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn ensure_bucket(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        if self.hang_writes {
            return std::future::pending().await;
        }
        if self.fail_writes {
            return Err(Error::storage(format!("write to {} refused", self.bucket)));
        }
        self.objects
            .lock()
            .push((key.to_string(), data, content_type.to_string()));
        Ok(storage_uri(&self.bucket, key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        "mock"
    }
}
