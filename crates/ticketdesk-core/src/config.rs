//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys via `__`, e.g.
//! `APP_GENERATION__MODEL`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Filters, DEFAULT_TOP_K};

pub struct Config {
    figment: Figment,
    env_name: String,
    base: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load with config files looked up under `base`.
    pub fn load_from(base: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(base, &env_name)
    }

    pub fn load_for_env(base: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string(), base: base.to_path_buf() };
        config.settings()?.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Expand `p` and anchor it at the directory the config files came from.
    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base, p)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The fully typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub semantic: SemanticConfig,
    pub generation: GenerationConfig,
    pub corpus: CorpusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Weight of the semantic signal; `1 - alpha` weights the lexical one.
    pub alpha: f32,
    /// Each source is asked for `top_k * candidate_multiplier` candidates.
    pub candidate_multiplier: usize,
    #[serde(default)]
    pub filters: Filters,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K, alpha: 0.7, candidate_multiplier: 4, filters: Filters::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hash,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dim: usize,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            model: "text-embedding-3-small".to_string(),
            dim: 1536,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticBackend {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    pub backend: SemanticBackend,
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            backend: SemanticBackend::Memory,
            url: "http://localhost:6333".to_string(),
            collection: "kb_chunks".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub dir: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { dir: "./data/corpus".to_string() }
    }
}

impl Settings {
    pub fn validate_for_env(&self, env: &str) -> Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(invalid(format!("retrieval.alpha must be within [0, 1], got {}", r.alpha)));
        }
        if r.top_k == 0 || r.candidate_multiplier == 0 {
            return Err(invalid("retrieval.top_k and retrieval.candidate_multiplier must be positive"));
        }
        if self.generation.timeout_secs == 0 || self.semantic.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err(invalid("adapter timeouts must be positive"));
        }
        if matches!(env, "prod" | "production") {
            if self.embedding.provider == EmbeddingProvider::Hash {
                return Err(invalid("the hashing embedder is for development only; configure embedding.provider"));
            }
            if self.semantic.backend == SemanticBackend::Memory {
                return Err(invalid("the memory vector index is for development only; configure semantic.backend"));
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
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
