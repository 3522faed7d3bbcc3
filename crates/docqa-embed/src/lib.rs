//! Embedding providers behind the [`docqa_core::Embedder`] seam.
//!
//! Two implementations: [`BertEmbedder`], a local sentence encoder run with
//! candle, and [`HashEmbedder`], a model-free hashed bag-of-words used for
//! tests and offline development.

use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use docqa_core::config::{resolve_with_base, EmbedderKind, EmbeddingSettings};
use docqa_core::{Embedder, Embedding};
use twox_hash::XxHash64;

mod bert;
mod device;
mod pool;
mod tokenize;

pub use bert::BertEmbedder;
pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Deterministic, L2-normalized token-hash embeddings.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:xxh64:d{dim}") }
    }

    pub fn dim(&self) -> usize { self.dim }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        // blank text stays the zero vector
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str { &self.id }

    fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the configured provider. `base` resolves a relative `model_dir`.
pub fn from_settings(settings: &EmbeddingSettings, base: &Path) -> Arc<dyn Embedder> {
    match settings.provider {
        EmbedderKind::Hash => {
            tracing::info!(dim = settings.hash_dim, "using hash embedder");
            Arc::new(HashEmbedder::new(settings.hash_dim))
        }
        EmbedderKind::Bert => {
            let dir = resolve_with_base(base, &settings.model_dir);
            tracing::info!(dir = %dir.display(), "using bert embedder");
            Arc::new(BertEmbedder::new(dir, settings.max_len, settings.batch_size))
        }
    }
}
