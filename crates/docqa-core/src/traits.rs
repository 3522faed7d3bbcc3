use crate::error::Result;
use crate::types::{Embedding, SourceDocument};

/// Text → vector encoder. Implementations must return one vector per input,
/// in input order, all of the same dimension.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:xxh64:d384`).
    fn id(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// Text-extraction collaborator: enumerates documents and yields their plain text.
pub trait DocumentSource: Send + Sync {
    fn documents(&self) -> Result<Vec<SourceDocument>>;
    fn extract(&self, document: &SourceDocument) -> Result<String>;
}
