use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::SourceDocument;

/// Text, Markdown and PDF documents under a folder, matched by extension.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        let extensions = extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { root: root.into(), extensions }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn describe(&self, path: &Path) -> Result<SourceDocument> {
        let meta = fs::metadata(path)?;
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_millis()).ok());
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        Ok(SourceDocument {
            id: relative.to_string_lossy().replace('\\', "/"),
            path: path.to_path_buf(),
            size: meta.len(),
            modified_ms,
        })
    }
}

impl DocumentSource for DirectorySource {
    /// Sorted by path. A missing root is an empty source, not an error.
    fn documents(&self) -> Result<Vec<SourceDocument>> {
        if !self.root.exists() {
            tracing::warn!(root = %self.root.display(), "document folder does not exist");
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }
            match self.describe(entry.path()) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "skipping document"),
            }
        }
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(root = %self.root.display(), count = docs.len(), "listed documents");
        Ok(docs)
    }

    fn extract(&self, document: &SourceDocument) -> Result<String> {
        let bytes = fs::read(&document.path).map_err(|e| Error::Extraction {
            document: document.id.clone(),
            message: e.to_string(),
        })?;
        if is_pdf(&document.path) {
            return extract_pdf(&document.id, &bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn extract_pdf(document: &str, bytes: &[u8]) -> Result<String> {
    let failed = |message: String| Error::Extraction { document: document.to_string(), message };
    // pdf-extract panics on some malformed inputs instead of returning an error
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| failed("PDF parser panicked".to_string()))?
        .map_err(|e| failed(format!("PDF extraction error: {e}")))?;
    if text.trim().is_empty() {
        tracing::warn!(document, "PDF contains no extractable text");
    }
    Ok(text)
}
