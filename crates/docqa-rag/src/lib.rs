//! Retrieval-augmented answering: corpus lifecycle, retrieval and prompt assembly.

use anyhow::Result;
use std::sync::Arc;

use docqa_core::config::Config;
use docqa_core::source::DirectorySource;
use docqa_core::Chunker;
use docqa_generate::OllamaClient;
use docqa_vector::VectorCache;

pub mod error;
pub mod orchestrator;
pub mod prompt;

pub use error::RagError;
pub use orchestrator::{Answer, AnswerOutcome, QueryOrchestrator, Source, StatusReport, DEFAULT_TOP_K};

/// Wire the configured document folder, embedder, cache and Ollama client together.
pub fn from_config(config: &Config) -> Result<QueryOrchestrator> {
    let settings = config.settings()?;
    let docs_dir = config.resolve(&settings.data.docs_dir);
    let cache_path = config.resolve(&settings.data.cache_path);
    tracing::info!(docs = %docs_dir.display(), cache = %cache_path.display(), "configuring pipeline");

    let source = Arc::new(DirectorySource::new(docs_dir, &settings.data.extensions));
    let embedder = docqa_embed::from_settings(&settings.embedding, config.base());
    let chunker = Chunker::new(settings.chunking)?;
    let cache = Arc::new(VectorCache::new(cache_path, source, embedder, chunker));
    let generator = Arc::new(OllamaClient::from_settings(&settings.generation)?);
    Ok(QueryOrchestrator::new(cache, generator, settings.retrieval.top_k))
}
