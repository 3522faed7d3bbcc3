//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`,
//! `OLLAMA_BASE_URL` and `APP_*` env vars (`__` separates sections, e.g.
//! `APP_RETRIEVAL__TOP_K=5`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against the directory the config was loaded from.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_dir: String,
    pub cache_path: String,
    pub extensions: Vec<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            docs_dir: "docs".to_string(),
            cache_path: "cache/corpus.json".to_string(),
            extensions: vec!["txt".to_string(), "md".to_string(), "pdf".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { top_k: 3 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local BERT-family sentence encoder loaded with candle.
    Bert,
    /// Deterministic hashed bag-of-words; no model files needed.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbedderKind,
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
    pub hash_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::Bert,
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            max_len: 256,
            batch_size: 32,
            hash_dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7007,
            allowed_origins: vec!["http://localhost:6006".to_string()],
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be > 0");
        }
        if self.embedding.max_len == 0 || self.embedding.batch_size == 0 || self.embedding.hash_dim == 0 {
            anyhow::bail!("embedding.max_len, embedding.batch_size and embedding.hash_dim must be > 0");
        }
        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be > 0");
        }
        if self.data.extensions.is_empty() {
            anyhow::bail!("data.extensions must list at least one extension");
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    base: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load with config files looked up in (and relative paths resolved against) `base`.
    pub fn load_from(base: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().only(&["OLLAMA_BASE_URL"]).map(|_| "generation.base_url".into()))
            .merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base: base.to_path_buf() };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated view of the whole configuration.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn base(&self) -> &Path { &self.base }

    /// Expand and resolve a configured path against the config base directory.
    pub fn resolve<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base, p)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            let provider: EmbedderKind = self.get("embedding.provider")?;
            if provider == EmbedderKind::Hash {
                anyhow::bail!("embedding.provider = \"hash\" is not allowed in production");
            }
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
