#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod source;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use traits::{DocumentSource, Embedder};
pub use types::{Chunk, Corpus, Embedding, ScoredChunk, SourceDocument};
