//! Durable corpus cache.
//!
//! `load(false)` trusts an existing record; `load(true)` rebuilds from the
//! document source. Rebuilds extract and chunk every document, embed all
//! chunks in one batch, and persist the result atomically.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::{Chunker, Corpus, DocumentSource, Embedder, Error, Result};

use crate::record::{source_fingerprint, CacheRecord, RecordHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No record on disk.
    Missing,
    Fresh,
    /// Documents changed since the record was written, or it was built by another embedder.
    Stale,
}

pub struct VectorCache {
    path: PathBuf,
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl VectorCache {
    pub fn new(
        path: impl Into<PathBuf>,
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
    ) -> Self {
        Self { path: path.into(), source, embedder, chunker }
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
    pub fn source(&self) -> &Arc<dyn DocumentSource> { &self.source }

    pub fn load(&self, force_reload: bool) -> Result<Corpus> {
        if !force_reload {
            if let Some(corpus) = self.read_cached() {
                return Ok(corpus);
            }
        }
        self.rebuild()
    }

    fn read_cached(&self) -> Option<Corpus> {
        let record = match CacheRecord::read(&self.path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no cache record");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable cache record; rebuilding");
                return None;
            }
        };
        if record.embedder_id != self.embedder.id() {
            tracing::info!(
                cached = %record.embedder_id,
                current = %self.embedder.id(),
                "cache record built by another embedder; rebuilding"
            );
            return None;
        }
        match record.into_corpus() {
            Ok(corpus) => {
                tracing::info!(chunks = corpus.len(), documents = corpus.documents().len(), "loaded corpus from cache");
                Some(corpus)
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "invalid cache record; rebuilding");
                None
            }
        }
    }

    /// Build a fresh corpus from the document source and persist it.
    ///
    /// Documents that fail extraction are skipped. An embedding failure
    /// aborts the build and leaves any existing record untouched.
    pub fn rebuild(&self) -> Result<Corpus> {
        let listed = self.source.documents()?;
        let fingerprint = source_fingerprint(&listed);
        tracing::info!(documents = listed.len(), "building corpus");

        let pb = ProgressBar::new(listed.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut documents = Vec::with_capacity(listed.len());
        let mut chunks = Vec::new();
        for doc in &listed {
            pb.set_message(doc.id.clone());
            match self.source.extract(doc) {
                Ok(text) => {
                    chunks.extend(self.chunker.chunk(&text, documents.len()));
                    documents.push(doc.id.clone());
                }
                Err(e) => tracing::warn!(document = %doc.id, error = %e, "skipping document"),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if chunks.is_empty() {
            tracing::info!("no text to index; corpus is empty");
            if let Err(e) = self.clear() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove old cache record");
            }
            return Ok(Corpus::empty());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Encoding(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let corpus = Corpus::new(documents, chunks, embeddings, self.embedder.id(), Utc::now())?;
        tracing::info!(
            chunks = corpus.len(),
            documents = corpus.documents().len(),
            dim = corpus.dimension().unwrap_or(0),
            build_id = corpus.build_id(),
            "corpus built"
        );

        match CacheRecord::from_corpus(&corpus, fingerprint).write_atomic(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "cache record written"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to persist corpus; serving in-memory copy"),
        }
        Ok(corpus)
    }

    /// Compare the record on disk with the current document listing.
    pub fn freshness(&self) -> Result<Freshness> {
        let header = match RecordHeader::read(&self.path) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(Freshness::Missing),
            Err(Error::InvalidCorpus(_)) => return Ok(Freshness::Stale),
            Err(e) => return Err(e),
        };
        if header.embedder_id != self.embedder.id() {
            return Ok(Freshness::Stale);
        }
        let current = source_fingerprint(&self.source.documents()?);
        Ok(if current == header.source_fingerprint { Freshness::Fresh } else { Freshness::Stale })
    }

    /// Remove the record. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
