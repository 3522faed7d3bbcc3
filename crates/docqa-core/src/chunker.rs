//! Fixed-window text chunking.
//!
//! Windows are counted in `char`s and advance by a fixed stride, so
//! consecutive chunks overlap by `window - stride` characters. Splitting
//! ignores sentence and paragraph boundaries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Chunk;

pub const DEFAULT_WINDOW: usize = 1000;
pub const DEFAULT_STRIDE: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window: usize,
    pub stride: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window: DEFAULT_WINDOW, stride: DEFAULT_STRIDE }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::InvalidConfig("chunking.window must be > 0".to_string()));
        }
        if self.stride == 0 {
            return Err(Error::InvalidConfig("chunking.stride must be > 0".to_string()));
        }
        if self.stride > self.window {
            return Err(Error::InvalidConfig(format!(
                "chunking.stride ({}) must not exceed chunking.window ({})",
                self.stride, self.window
            )));
        }
        if self.stride == self.window {
            tracing::debug!(window = self.window, "chunking without overlap");
        }
        Ok(())
    }

    /// Number of chunks a text of `len` chars produces.
    pub fn chunk_count(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        len.saturating_sub(self.window).div_ceil(self.stride) + 1
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig { self.config }

    /// Split `text` into windows tagged with `source_index`.
    ///
    /// The last window is the first one that reaches the end of the text, so
    /// every chunk except the last is exactly `window` chars long.
    pub fn chunk(&self, text: &str, source_index: usize) -> Vec<Chunk> {
        let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let len = offsets.len();
        let byte_at = |pos: usize| if pos >= len { text.len() } else { offsets[pos] };

        let mut chunks = Vec::with_capacity(self.config.chunk_count(len));
        let mut start = 0usize;
        while start < len {
            let end = (start + self.config.window).min(len);
            chunks.push(Chunk { text: text[byte_at(start)..byte_at(end)].to_string(), source_index });
            if end == len {
                break;
            }
            start += self.config.stride;
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self { Self { config: ChunkingConfig::default() } }
}
