//! Lazy, once-only model initialization
//!
//! The remote handshake (credentials, corpus lookup, retrieval tool, model
//! handle) is expensive, so it runs on first use instead of at startup.
//! [`ModelInitializer::ensure_ready`] may be called from any number of
//! concurrent requests; at most one of them performs the setup and everyone
//! else observes its outcome.
//!
//! Failure policy: a failed setup is retried by a later caller once an
//! exponential backoff has elapsed, up to `init.max_attempts` attempts. After
//! that the failure is terminal for the life of the process. Until a retry is
//! due every caller gets `Error::ServiceUnavailable` immediately.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

use crate::config::InitConfig;
use crate::error::{Error, Result};
use crate::providers::{ChatModel, RagService};
use crate::types::{RagCorpus, RetrievalTool};

/// Ready-to-use model bound to the configured corpus
#[derive(Clone)]
pub struct ModelHandle {
    corpus: RagCorpus,
    model: Arc<dyn ChatModel>,
}

impl ModelHandle {
    pub fn new(corpus: RagCorpus, model: Arc<dyn ChatModel>) -> Self {
        Self { corpus, model }
    }

    /// Corpus the model retrieves from and uploads are ingested into
    pub fn corpus(&self) -> &RagCorpus {
        &self.corpus
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Whether both handles share the same underlying model
    pub fn same_model(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.model, &other.model)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("corpus", &self.corpus.name)
            .field("model", &self.model.model())
            .finish()
    }
}

enum InitState {
    Uninitialized,
    InProgress { attempts: u32 },
    Ready(ModelHandle),
    Failed(Failure),
}

#[derive(Clone)]
struct Failure {
    reason: String,
    attempts: u32,
    /// `None` once attempts are exhausted
    retry_at: Option<Instant>,
}

impl Failure {
    fn retry_due(&self) -> bool {
        matches!(self.retry_at, Some(at) if Instant::now() >= at)
    }

    fn unavailable(&self) -> Error {
        Error::ServiceUnavailable(self.reason.clone())
    }
}

/// Restores the pre-attempt state unless disarmed
struct AttemptGuard<'a> {
    state: &'a RwLock<InitState>,
    previous: Option<InitState>,
}

impl AttemptGuard<'_> {
    fn disarm(mut self) {
        self.previous = None;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::warn!("Model initialization cancelled before it finished");
            *self.state.write() = previous;
        }
    }
}

/// Snapshot of the initializer for readiness probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitStatus {
    Uninitialized,
    InProgress,
    Ready {
        corpus: String,
        model: String,
    },
    Failed {
        reason: String,
        attempts: u32,
        terminal: bool,
    },
}

/// Guards the one-time remote setup of the chat model
pub struct ModelInitializer {
    rag: Arc<dyn RagService>,
    corpus_display_name: String,
    model_name: String,
    policy: InitConfig,
    setup_timeout: Duration,
    state: RwLock<InitState>,
    gate: Mutex<()>,
}

impl ModelInitializer {
    pub fn new(
        rag: Arc<dyn RagService>,
        corpus_display_name: impl Into<String>,
        model_name: impl Into<String>,
        policy: InitConfig,
        setup_timeout: Duration,
    ) -> Self {
        Self {
            rag,
            corpus_display_name: corpus_display_name.into(),
            model_name: model_name.into(),
            policy,
            setup_timeout,
            state: RwLock::new(InitState::Uninitialized),
            gate: Mutex::new(()),
        }
    }

    /// Return the model handle, running the remote setup if nobody has yet.
    pub async fn ensure_ready(&self) -> Result<ModelHandle> {
        // Fast path, no gate
        let observed_attempts = match &*self.state.read() {
            InitState::Ready(handle) => return Ok(handle.clone()),
            InitState::Failed(failure) if !failure.retry_due() => {
                return Err(failure.unavailable())
            }
            InitState::Failed(failure) => failure.attempts,
            InitState::InProgress { attempts } => *attempts,
            InitState::Uninitialized => 0,
        };

        let _gate = self.gate.lock().await;

        let attempts = match &*self.state.read() {
            InitState::Ready(handle) => return Ok(handle.clone()),
            // Someone else attempted while we waited: share their outcome
            InitState::Failed(failure)
                if failure.attempts != observed_attempts || !failure.retry_due() =>
            {
                return Err(failure.unavailable())
            }
            InitState::Failed(failure) => failure.attempts,
            InitState::InProgress { attempts } => *attempts,
            InitState::Uninitialized => 0,
        };

        let previous =
            std::mem::replace(&mut *self.state.write(), InitState::InProgress { attempts });
        // Dropped before `disarm` (caller cancelled): put the previous state back
        let attempt = AttemptGuard {
            state: &self.state,
            previous: Some(previous),
        };
        tracing::info!(
            "Initializing model '{}' against corpus '{}' via {} (attempt {})",
            self.model_name,
            self.corpus_display_name,
            self.rag.name(),
            attempts + 1
        );

        let start = Instant::now();
        let outcome = match timeout(self.setup_timeout, self.setup()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::InitializationFailure(format!(
                "setup timed out after {:?}",
                self.setup_timeout
            ))),
        };

        attempt.disarm();

        match outcome {
            Ok(handle) => {
                tracing::info!(
                    "Model ready in {:.2}s (corpus: {})",
                    start.elapsed().as_secs_f64(),
                    handle.corpus().name
                );
                *self.state.write() = InitState::Ready(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                let attempts = attempts + 1;
                let retry_at = self
                    .policy
                    .may_retry(attempts)
                    .then(|| {
                        let now = Instant::now();
                        now.checked_add(self.policy.backoff_after(attempts))
                            .unwrap_or(now)
                    });

                match retry_at {
                    Some(at) => tracing::warn!(
                        "Model initialization failed (attempt {}), retry allowed in {:?}: {}",
                        attempts,
                        at.saturating_duration_since(Instant::now()),
                        e
                    ),
                    None => tracing::error!(
                        "Model initialization failed after {} attempts, giving up: {}",
                        attempts,
                        e
                    ),
                }

                let failure = Failure {
                    reason: e.to_string(),
                    attempts,
                    retry_at,
                };
                let err = failure.unavailable();
                *self.state.write() = InitState::Failed(failure);
                Err(err)
            }
        }
    }

    /// Remote setup sequence
    async fn setup(&self) -> Result<ModelHandle> {
        self.rag.connect().await?;

        let corpora = self.rag.list_corpora().await?;
        tracing::debug!("Found {} corpora", corpora.len());

        let corpus = corpora
            .into_iter()
            .find(|c| c.display_name == self.corpus_display_name)
            .ok_or_else(|| Error::CorpusNotFound(self.corpus_display_name.clone()))?;

        let tool = RetrievalTool::for_corpus(&corpus);
        let model = self.rag.chat_model(&self.model_name, tool)?;

        Ok(ModelHandle::new(corpus, model))
    }

    /// Kick off initialization in the background
    pub fn warm_up(self: &Arc<Self>) {
        let initializer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = initializer.ensure_ready().await {
                tracing::warn!("Eager model initialization failed: {}", e);
            }
        });
    }

    /// Current state, without triggering initialization
    pub fn status(&self) -> InitStatus {
        match &*self.state.read() {
            InitState::Uninitialized => InitStatus::Uninitialized,
            InitState::InProgress { .. } => InitStatus::InProgress,
            InitState::Ready(handle) => InitStatus::Ready {
                corpus: handle.corpus().name.clone(),
                model: handle.model().model().to_string(),
            },
            InitState::Failed(failure) => InitStatus::Failed {
                reason: failure.reason.clone(),
                attempts: failure.attempts,
                terminal: failure.retry_at.is_none(),
            },
        }
    }
}
