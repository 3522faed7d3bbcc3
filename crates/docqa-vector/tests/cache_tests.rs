use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docqa_core::source::DirectorySource;
use docqa_core::{Chunker, ChunkingConfig, DocumentSource, Embedder, Embedding, Error, SourceDocument};
use docqa_embed::HashEmbedder;
use docqa_vector::{CacheRecord, Freshness, VectorCache};

/// Hash embedder that counts how often it is asked to encode.
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> { Arc::new(Self { inner: HashEmbedder::new(32), calls: AtomicUsize::new(0) }) }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn id(&self) -> &str { "hash:xxh64:d32" }
    fn embed_batch(&self, _texts: &[String]) -> docqa_core::Result<Vec<Embedding>> {
        Err(Error::Encoding("model offline".to_string()))
    }
}

/// In-memory documents; `None` text fails extraction.
struct MemorySource(Vec<(&'static str, Option<String>)>);

impl DocumentSource for MemorySource {
    fn documents(&self) -> docqa_core::Result<Vec<SourceDocument>> {
        Ok(self
            .0
            .iter()
            .map(|(id, text)| SourceDocument {
                id: id.to_string(),
                path: PathBuf::from(id),
                size: text.as_ref().map_or(0, |t| t.len() as u64),
                modified_ms: None,
            })
            .collect())
    }

    fn extract(&self, document: &SourceDocument) -> docqa_core::Result<String> {
        self.0
            .iter()
            .find(|(id, _)| *id == document.id)
            .and_then(|(_, text)| text.clone())
            .ok_or_else(|| Error::Extraction { document: document.id.clone(), message: "unreadable".to_string() })
    }
}

fn small_chunker() -> Chunker {
    Chunker::new(ChunkingConfig { window: 40, stride: 30 }).expect("chunker")
}

fn write_docs(dir: &Path) {
    std::fs::write(dir.join("alpha.txt"), "The pump manual describes priming the pump before first use. ".repeat(3)).unwrap();
    std::fs::write(dir.join("beta.md"), "Solar panels should be cleaned twice a year.").unwrap();
}

fn dir_cache(docs: &Path, record: &Path, embedder: Arc<dyn Embedder>) -> VectorCache {
    let source = Arc::new(DirectorySource::new(docs, &["txt".to_string(), "md".to_string()]));
    VectorCache::new(record, source, embedder, small_chunker())
}

#[test]
fn load_after_build_reuses_record_without_encoding() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");

    let first = CountingEmbedder::new();
    let built = dir_cache(docs.path(), &record, first.clone()).load(true).expect("build");
    assert_eq!(first.calls(), 1, "one batched encode per build");
    assert!(!built.is_empty());
    assert_eq!(built.documents(), &["alpha.txt".to_string(), "beta.md".to_string()]);

    let second = CountingEmbedder::new();
    let loaded = dir_cache(docs.path(), &record, second.clone()).load(false).expect("load");
    assert_eq!(second.calls(), 0);
    assert_eq!(loaded.chunks(), built.chunks());
    assert_eq!(loaded.embeddings(), built.embeddings());
    assert_eq!(loaded.documents(), built.documents());
    assert_ne!(loaded.build_id(), built.build_id());
}

#[test]
fn load_without_record_builds_and_force_reload_reencodes() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");
    let embedder = CountingEmbedder::new();
    let cache = dir_cache(docs.path(), &record, embedder.clone());

    cache.load(false).expect("first load builds");
    assert_eq!(embedder.calls(), 1);
    assert!(record.exists());
    cache.load(false).expect("cached");
    assert_eq!(embedder.calls(), 1);
    cache.load(true).expect("forced");
    assert_eq!(embedder.calls(), 2);
}

#[test]
fn corrupt_or_truncated_record_falls_back_to_rebuild() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");

    std::fs::write(&record, "{ not json").unwrap();
    let embedder = CountingEmbedder::new();
    let cache = dir_cache(docs.path(), &record, embedder.clone());
    let corpus = cache.load(false).expect("rebuild over garbage");
    assert_eq!(embedder.calls(), 1);
    assert!(!corpus.is_empty());

    let bytes = std::fs::read(&record).unwrap();
    std::fs::write(&record, &bytes[..bytes.len() / 2]).unwrap();
    cache.load(false).expect("rebuild over truncated record");
    assert_eq!(embedder.calls(), 2);
    assert!(CacheRecord::read(&record).expect("readable").is_some());
}

#[test]
fn structurally_invalid_record_is_treated_as_absent() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");
    let embedder = CountingEmbedder::new();
    let cache = dir_cache(docs.path(), &record, embedder.clone());
    cache.load(true).expect("build");

    let mut stored = CacheRecord::read(&record).unwrap().unwrap();
    stored.embeddings.pop();
    stored.write_atomic(&record).unwrap();

    let corpus = cache.load(false).expect("rebuild");
    assert_eq!(embedder.calls(), 2);
    assert_eq!(corpus.chunks().len(), corpus.embeddings().len());
}

#[test]
fn record_from_another_embedder_is_rebuilt() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");

    dir_cache(docs.path(), &record, Arc::new(HashEmbedder::new(16))).load(true).expect("build d16");
    let embedder = CountingEmbedder::new();
    let corpus = dir_cache(docs.path(), &record, embedder.clone()).load(false).expect("load d32");
    assert_eq!(embedder.calls(), 1);
    assert_eq!(corpus.dimension(), Some(32));
}

#[test]
fn failed_extraction_skips_only_that_document() {
    let cache_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource(vec![
        ("a.txt", Some("first document".to_string())),
        ("broken.txt", None),
        ("c.txt", Some("third document".to_string())),
    ]));
    let cache = VectorCache::new(cache_dir.path().join("c.json"), source, CountingEmbedder::new(), small_chunker());
    let corpus = cache.load(true).expect("build");
    assert_eq!(corpus.documents(), &["a.txt".to_string(), "c.txt".to_string()]);
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.document_of(&corpus.chunks()[1]), Some("c.txt"));
}

#[test]
fn empty_source_gives_empty_corpus_and_no_record() {
    let cache_dir = tempfile::tempdir().unwrap();
    let record = cache_dir.path().join("corpus.json");
    let embedder = CountingEmbedder::new();
    let cache = VectorCache::new(&record, Arc::new(MemorySource(vec![])), embedder.clone(), small_chunker());

    let corpus = cache.load(false).expect("empty is not an error");
    assert!(corpus.is_empty());
    assert_eq!(corpus.build_id(), 0);
    assert_eq!(embedder.calls(), 0);
    assert!(!record.exists());
}

#[test]
fn empty_rebuild_discards_previous_record() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");
    let cache = dir_cache(docs.path(), &record, CountingEmbedder::new());
    cache.load(true).expect("build");
    assert!(record.exists());

    std::fs::remove_file(docs.path().join("alpha.txt")).unwrap();
    std::fs::remove_file(docs.path().join("beta.md")).unwrap();
    assert!(cache.load(true).expect("rebuild").is_empty());
    assert!(!record.exists());
}

#[test]
fn encoding_failure_is_an_error_and_writes_nothing() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let record = cache_dir.path().join("corpus.json");
    let err = dir_cache(docs.path(), &record, Arc::new(FailingEmbedder)).load(true).expect_err("must fail");
    assert!(matches!(err, Error::Encoding(_)));
    assert!(!record.exists());
}

#[test]
fn freshness_tracks_document_changes() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    let cache = dir_cache(docs.path(), &cache_dir.path().join("corpus.json"), CountingEmbedder::new());

    assert_eq!(cache.freshness().unwrap(), Freshness::Missing);
    cache.load(false).unwrap();
    assert_eq!(cache.freshness().unwrap(), Freshness::Fresh);

    std::fs::write(docs.path().join("gamma.txt"), "new notes on rainwater storage").unwrap();
    assert_eq!(cache.freshness().unwrap(), Freshness::Stale);
    // staleness is reported, never acted on by a plain load
    let corpus = cache.load(false).unwrap();
    assert_eq!(corpus.documents().len(), 2);

    cache.load(true).unwrap();
    assert_eq!(cache.freshness().unwrap(), Freshness::Fresh);
    assert!(cache.clear().unwrap());
    assert!(!cache.clear().unwrap());
}

#[test]
fn corrupt_pdf_is_skipped_and_text_still_indexed() {
    let docs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    std::fs::write(docs.path().join("broken.pdf"), b"%PDF-1.7\nnot a real pdf body\n%%EOF").unwrap();
    std::fs::write(docs.path().join("notes.txt"), "Store rainwater in covered barrels.").unwrap();
    let exts = ["pdf".to_string(), "txt".to_string()];
    let source = Arc::new(DirectorySource::new(docs.path(), &exts));
    let cache = VectorCache::new(cache_dir.path().join("c.json"), source, CountingEmbedder::new(), small_chunker());

    let corpus = cache.load(true).expect("build despite bad pdf");
    assert_eq!(corpus.documents(), &["notes.txt".to_string()]);
    assert_eq!(corpus.len(), 1);
}
