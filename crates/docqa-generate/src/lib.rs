//! Text generation backends.

use async_trait::async_trait;

mod error;
mod ollama;

pub use error::GenerationError;
pub use ollama::{DecodingOptions, OllamaClient};

/// Prompt in, completion text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
