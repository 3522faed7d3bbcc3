//! On-disk corpus record.
//!
//! One JSON document per cache path. A record is either fully present and
//! structurally valid or it is treated as absent; writes go to a temp file in
//! the same directory which is fsynced and renamed over the old record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use docqa_core::{Chunk, Corpus, Embedding, Error, Result, SourceDocument};

pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub embedder_id: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub source_fingerprint: String,
    pub documents: Vec<String>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Embedding>,
}

/// Metadata-only view of a record; the payload fields are skipped when parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordHeader {
    pub version: u32,
    pub embedder_id: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub source_fingerprint: String,
}

impl CacheRecord {
    pub fn from_corpus(corpus: &Corpus, source_fingerprint: String) -> Self {
        Self {
            version: RECORD_VERSION,
            embedder_id: corpus.embedder_id().to_string(),
            dimension: corpus.dimension().unwrap_or(0),
            built_at: corpus.built_at(),
            source_fingerprint,
            documents: corpus.documents().to_vec(),
            chunks: corpus.chunks().to_vec(),
            embeddings: corpus.embeddings().to_vec(),
        }
    }

    /// `Ok(None)` when no record exists; `Err` when one exists but cannot be parsed.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        read_json(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != RECORD_VERSION {
            return Err(Error::InvalidCorpus(format!("unsupported record version {}", self.version)));
        }
        if self.chunks.len() != self.embeddings.len() {
            return Err(Error::InvalidCorpus(format!(
                "{} chunks but {} embeddings",
                self.chunks.len(),
                self.embeddings.len()
            )));
        }
        if self.chunks.is_empty() || self.dimension == 0 {
            return Err(Error::InvalidCorpus("record holds no vectors".to_string()));
        }
        if let Some(bad) = self.embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(Error::DimensionMismatch { expected: self.dimension, got: bad.len() });
        }
        if let Some(bad) = self.chunks.iter().find(|c| c.source_index >= self.documents.len()) {
            return Err(Error::InvalidCorpus(format!("chunk references missing document {}", bad.source_index)));
        }
        Ok(())
    }

    pub fn into_corpus(self) -> Result<Corpus> {
        self.validate()?;
        Corpus::new(self.documents, self.chunks, self.embeddings, self.embedder_id, self.built_at)
    }

    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self).map_err(|e| Error::Persistence(e.to_string()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Persistence(format!("rename onto {}: {}", path.display(), e.error)))?;
        Ok(())
    }
}

impl RecordHeader {
    pub fn read(path: &Path) -> Result<Option<Self>> {
        read_json(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| Error::InvalidCorpus(format!("{}: {}", path.display(), e)))
}

/// blake3 over `(id, size, mtime)` of every listed document, in id order.
pub fn source_fingerprint(documents: &[SourceDocument]) -> String {
    let mut sorted: Vec<&SourceDocument> = documents.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    let mut hasher = blake3::Hasher::new();
    for doc in sorted {
        hasher.update(doc.id.as_bytes());
        hasher.update(&[0]);
        hasher.update(&doc.size.to_le_bytes());
        hasher.update(&doc.modified_ms.unwrap_or(-1).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
