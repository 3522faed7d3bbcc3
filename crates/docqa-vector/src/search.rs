//! Exact cosine top-k over an in-memory corpus.

use std::cmp::Ordering;
use std::sync::Arc;

use docqa_core::{Corpus, Error, Result, ScoredChunk};

pub struct SimilarityIndex {
    corpus: Arc<Corpus>,
}

impl SimilarityIndex {
    pub fn new(corpus: Arc<Corpus>) -> Self { Self { corpus } }

    pub fn corpus(&self) -> &Arc<Corpus> { &self.corpus }

    /// Top `k` chunks by cosine similarity to `query`.
    ///
    /// Results are ordered by descending score, ties broken by ascending
    /// chunk index, and hold `min(k, corpus.len())` entries.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.corpus.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.corpus.dimension() {
            if query.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: query.len() });
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .corpus
            .embeddings()
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, e)))
            .collect();
        let by_rank = |a: &(usize, f32), b: &(usize, f32)| rank_desc(a.1, b.1).then(a.0.cmp(&b.0));
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        let chunks = self.corpus.chunks();
        Ok(scored
            .into_iter()
            .map(|(index, score)| ScoredChunk { index, chunk: chunks[index].clone(), score })
            .collect())
    }
}

// descending; NaN sorts after every number
fn rank_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Cosine similarity accumulated in f64. Zero-magnitude input scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}
