//! Question answering over a lazily loaded, swappable corpus.

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OnceCell};

use docqa_core::{Corpus, Error};
use docqa_generate::Generator;
use docqa_vector::{Freshness, SimilarityIndex, VectorCache};

use crate::error::RagError;
use crate::prompt::{backend_failure_message, build_context, render_prompt, EMPTY_QUESTION_MESSAGE, NOT_READY_MESSAGE};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    /// The corpus is empty; nothing was retrieved or generated.
    NotReady,
    EmptyQuestion,
    /// Retrieval worked but the generation backend failed.
    BackendUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub document: String,
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
    pub sources: Vec<Source>,
}

impl Answer {
    fn fixed(text: &str, outcome: AnswerOutcome) -> Self {
        Self { text: text.to_string(), outcome, sources: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub document_files: usize,
    pub text_chunks: usize,
    pub ready: bool,
    pub stale: bool,
    pub build_id: u64,
    pub embedder: String,
}

pub struct QueryOrchestrator {
    cache: Arc<VectorCache>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    corpus: RwLock<Arc<Corpus>>,
    loaded: OnceCell<()>,
    build_lock: Mutex<()>,
}

impl QueryOrchestrator {
    pub fn new(cache: Arc<VectorCache>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            cache,
            generator,
            top_k,
            corpus: RwLock::new(Arc::new(Corpus::empty())),
            loaded: OnceCell::new(),
            build_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<VectorCache> { &self.cache }
    pub fn top_k(&self) -> usize { self.top_k }

    /// Current corpus. Readers keep their snapshot even if a reload swaps in a new one.
    pub fn snapshot(&self) -> Arc<Corpus> {
        Arc::clone(&self.corpus.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Load the corpus on first use. Concurrent first callers share one load;
    /// a failed load is retried by the next caller.
    pub async fn ensure_loaded(&self) -> Result<Arc<Corpus>, RagError> {
        self.loaded
            .get_or_try_init(|| async { self.reload(false).await.map(|_| ()) })
            .await?;
        Ok(self.snapshot())
    }

    /// Load (or with `force`, rebuild) the corpus and swap it in.
    pub async fn reload(&self, force: bool) -> Result<Arc<Corpus>, RagError> {
        let _guard = self.build_lock.lock().await;
        let cache = Arc::clone(&self.cache);
        let corpus = Arc::new(tokio::task::spawn_blocking(move || cache.load(force)).await??);
        *self.corpus.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&corpus);
        // already set, or being set by the first load that called us
        let _ = self.loaded.set(());
        tracing::info!(build_id = corpus.build_id(), chunks = corpus.len(), force, "corpus ready");
        Ok(corpus)
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, RagError> {
        if question.trim().is_empty() {
            return Ok(Answer::fixed(EMPTY_QUESTION_MESSAGE, AnswerOutcome::EmptyQuestion));
        }
        let corpus = self.ensure_loaded().await?;
        if corpus.is_empty() {
            tracing::debug!("question received before any documents were loaded");
            return Ok(Answer::fixed(NOT_READY_MESSAGE, AnswerOutcome::NotReady));
        }

        let embedder = Arc::clone(self.cache.embedder());
        let texts = vec![question.to_string()];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts)).await??;
        let query = vectors
            .pop()
            .ok_or_else(|| Error::Encoding("embedder returned no vector for the question".to_string()))?;

        let hits = SimilarityIndex::new(Arc::clone(&corpus)).search(&query, self.top_k)?;
        let sources = hits
            .iter()
            .map(|h| Source {
                document: corpus.document_of(&h.chunk).unwrap_or_default().to_string(),
                chunk_index: h.index,
                score: h.score,
            })
            .collect();
        let prompt = render_prompt(&build_context(&hits), question);
        tracing::debug!(hits = hits.len(), prompt_len = prompt.len(), "retrieved context");

        match self.generator.generate(&prompt).await {
            Ok(text) => Ok(Answer { text, outcome: AnswerOutcome::Generated, sources }),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                Ok(Answer { text: backend_failure_message(&e), outcome: AnswerOutcome::BackendUnavailable, sources })
            }
        }
    }

    /// Answer text only. Internal failures are folded into an `Error:` string.
    pub async fn answer(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(answer) => answer.text,
            Err(e) => {
                tracing::error!(error = %e, "question could not be answered");
                format!("Error: {e}")
            }
        }
    }

    pub async fn status(&self) -> Result<StatusReport, RagError> {
        let corpus = self.ensure_loaded().await?;
        let cache = Arc::clone(&self.cache);
        let (document_files, freshness) = tokio::task::spawn_blocking(move || {
            let listed = cache.source().documents()?.len();
            Ok::<_, Error>((listed, cache.freshness()?))
        })
        .await??;
        Ok(StatusReport {
            document_files,
            text_chunks: corpus.len(),
            ready: !corpus.is_empty(),
            stale: freshness == Freshness::Stale,
            build_id: corpus.build_id(),
            embedder: self.cache.embedder().id().to_string(),
        })
    }
}
