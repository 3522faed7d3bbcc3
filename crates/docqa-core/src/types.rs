//! Domain types shared by the cache, the similarity index and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

pub type Embedding = Vec<f32>;

static NEXT_BUILD_ID: AtomicU64 = AtomicU64::new(1);

/// A bounded window of a source document's extracted text.
///
/// `source_index` points into [`Corpus::documents`]. The chunk's own identity
/// is its position in the corpus, which aligns it with its embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_index: usize,
}

/// A document as listed by a [`crate::DocumentSource`], before extraction.
///
/// `id` is the path relative to the source root; `modified_ms` is the
/// modification time in unix milliseconds when the platform reports one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified_ms: Option<i64>,
}

/// One retrieval hit. Produced per query and dropped after prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub index: usize,
    pub chunk: Chunk,
    pub score: f32,
}

/// The searchable knowledge base: chunks and their embeddings, position-aligned.
///
/// A corpus is never mutated after construction; reloads build a new one and
/// swap it in wholesale.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<String>,
    chunks: Vec<Chunk>,
    embeddings: Vec<Embedding>,
    embedder_id: String,
    built_at: DateTime<Utc>,
    build_id: u64,
}

impl Corpus {
    /// The "not ready" corpus. Its build id is always 0.
    pub fn empty() -> Self {
        Self {
            documents: Vec::new(),
            chunks: Vec::new(),
            embeddings: Vec::new(),
            embedder_id: String::new(),
            built_at: Utc::now(),
            build_id: 0,
        }
    }

    /// Assemble a corpus, checking that chunks and embeddings line up.
    pub fn new(
        documents: Vec<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Embedding>,
        embedder_id: impl Into<String>,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::InvalidCorpus(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            let dim = first.len();
            if dim == 0 {
                return Err(Error::InvalidCorpus("zero-length embedding".to_string()));
            }
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, got: bad.len() });
            }
        }
        if let Some(orphan) = chunks.iter().find(|c| c.source_index >= documents.len()) {
            return Err(Error::InvalidCorpus(format!(
                "chunk references document {} of {}",
                orphan.source_index,
                documents.len()
            )));
        }
        Ok(Self {
            documents,
            chunks,
            embeddings,
            embedder_id: embedder_id.into(),
            built_at,
            build_id: NEXT_BUILD_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn documents(&self) -> &[String] { &self.documents }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn embeddings(&self) -> &[Embedding] { &self.embeddings }
    pub fn embedder_id(&self) -> &str { &self.embedder_id }
    pub fn built_at(&self) -> DateTime<Utc> { self.built_at }
    pub fn build_id(&self) -> u64 { self.build_id }

    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Embedding dimension, or `None` for an empty corpus.
    pub fn dimension(&self) -> Option<usize> { self.embeddings.first().map(Vec::len) }

    /// Document id a chunk was cut from.
    pub fn document_of(&self, chunk: &Chunk) -> Option<&str> {
        self.documents.get(chunk.source_index).map(String::as_str)
    }
}

impl Default for Corpus {
    fn default() -> Self { Self::empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, source_index: usize) -> Chunk {
        Chunk { text: text.to_string(), source_index }
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Corpus::new(vec!["a".into()], vec![chunk("x", 0)], vec![], "t", Utc::now())
            .expect_err("mismatch must fail");
        assert!(matches!(err, Error::InvalidCorpus(_)));
    }

    #[test]
    fn new_rejects_ragged_vectors() {
        let err = Corpus::new(
            vec!["a".into()],
            vec![chunk("x", 0), chunk("y", 0)],
            vec![vec![1.0, 0.0], vec![1.0]],
            "t",
            Utc::now(),
        )
        .expect_err("ragged must fail");
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn new_rejects_dangling_source_index() {
        let err = Corpus::new(vec![], vec![chunk("x", 0)], vec![vec![1.0]], "t", Utc::now())
            .expect_err("dangling source must fail");
        assert!(matches!(err, Error::InvalidCorpus(_)));
    }

    #[test]
    fn build_ids_increase() {
        let a = Corpus::new(vec![], vec![], vec![], "t", Utc::now()).expect("a");
        let b = Corpus::new(vec![], vec![], vec![], "t", Utc::now()).expect("b");
        assert!(b.build_id() > a.build_id());
        assert_eq!(Corpus::empty().build_id(), 0);
        assert!(a.is_empty());
        assert_eq!(a.dimension(), None);
    }
}
