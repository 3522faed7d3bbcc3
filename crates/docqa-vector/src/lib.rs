//! Corpus persistence and similarity search.

pub mod cache;
pub mod record;
pub mod search;

pub use cache::{Freshness, VectorCache};
pub use record::{source_fingerprint, CacheRecord, RecordHeader, RECORD_VERSION};
pub use search::{cosine_similarity, SimilarityIndex};
