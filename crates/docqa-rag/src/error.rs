use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Core(#[from] docqa_core::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
