//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=8`). Typed
//! [`Settings`] fall back to built-in defaults for every missing key.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Wrap an already assembled figment, e.g. one built in a test.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract typed settings, layering the loaded sources over the defaults.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub cache: CacheSettings,
    pub ingest: IngestSettings,
    pub answer: AnswerSettings,
    pub paths: PathSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.chunking.size == 0 {
            return invalid("chunking.size must be positive".to_string());
        }
        if self.chunking.overlap >= self.chunking.size {
            return invalid(format!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap, self.chunking.size
            ));
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be positive".to_string());
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return invalid(format!(
                "retrieval.similarity_threshold ({}) must lie in [-1, 1]",
                self.retrieval.similarity_threshold
            ));
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be positive".to_string());
        }
        if self.ingest.embed_batch_size == 0 {
            return invalid("ingest.embed_batch_size must be positive".to_string());
        }
        if self.answer.deadline_secs == 0 {
            return invalid("answer.deadline_secs must be positive".to_string());
        }
        if self.embedding.dim == 0 {
            return invalid("embedding.dim must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, similarity_threshold: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub embed_batch_size: usize,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { embed_batch_size: 32, max_retries: 3, retry_base_ms: 200, retry_max_ms: 5000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    pub deadline_secs: u64,
    pub history_limit: usize,
}

impl AnswerSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self { deadline_secs: 30, history_limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub index: String,
    pub store: String,
}

impl PathSettings {
    pub fn index_path(&self) -> PathBuf {
        expand_path(&self.index)
    }

    pub fn store_path(&self) -> PathBuf {
        expand_path(&self.store)
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self { index: "~/.docrag/index.bin".to_string(), store: "~/.docrag/store.json".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model files needed.
    Hash,
    /// Local BERT-family model loaded with candle.
    Candle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub dim: usize,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Hash, dim: 384, model_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.chunking.size, 1000);
        assert_eq!(s.chunking.overlap, 200);
        assert_eq!(s.retrieval.top_k, 5);
        assert!((s.retrieval.similarity_threshold - 0.2).abs() < f32::EPSILON);
        assert_eq!(s.cache.ttl(), Duration::from_secs(3600));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let figment = Figment::new().merge(Toml::string(
            "[retrieval]\ntop_k = 9\n[chunking]\nsize = 500\noverlap = 50\n",
        ));
        let settings = Config::from_figment(figment).settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 9);
        assert!((settings.retrieval.similarity_threshold - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.chunking.size, 500);
        assert_eq!(settings.cache.ttl_secs, 3600);
    }

    #[test]
    fn get_reads_nested_key() {
        let figment = Figment::new().merge(Toml::string("[paths]\nindex = \"/var/idx.bin\"\n"));
        let config = Config::from_figment(figment);
        let index: String = config.get("paths.index").unwrap();
        assert_eq!(index, "/var/idx.bin");
        assert!(config.get::<String>("paths.missing").is_err());
    }

    #[test]
    fn validate_rejects_bad_overlap_and_threshold() {
        let mut s = Settings::default();
        s.chunking.overlap = s.chunking.size;
        assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));

        let mut s = Settings::default();
        s.retrieval.similarity_threshold = 1.5;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.cache.ttl_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn backend_parses_lowercase() {
        let figment = Figment::new().merge(Toml::string("[embedding]\nbackend = \"candle\"\ndim = 1024\n"));
        let settings = Config::from_figment(figment).settings().unwrap();
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Candle);
        assert_eq!(settings.embedding.dim, 1024);
    }

    #[test]
    fn resolve_keeps_absolute_and_joins_relative() {
        let base = Path::new("/data");
        assert_eq!(resolve_with_base(base, "/abs/x"), PathBuf::from("/abs/x"));
        assert_eq!(resolve_with_base(base, "rel/x"), PathBuf::from("/data/rel/x"));
    }
}
