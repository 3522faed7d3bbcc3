use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Extraction failed for {document}: {message}")]
    Extraction { document: String, message: String },

    #[error("Cache persistence failed: {0}")]
    Persistence(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
