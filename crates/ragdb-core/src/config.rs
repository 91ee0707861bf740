//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_STORE__BACKEND=memory`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{MergePolicy, SearchMode, SearchParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub chunking: ChunkingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `lancedb` or `memory`.
    pub backend: String,
    pub dir: String,
    pub docs_table_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { backend: "lancedb".into(), dir: "data/store".into(), docs_table_name: "docs".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `fake`, `openai` or `local`.
    pub provider: String,
    pub model_id: String,
    pub embedding_size: usize,
    pub completion_model: Option<String>,
    pub base_url: String,
    pub api_key_env: String,
    pub model_dir: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "fake".into(),
            model_id: "hash-384".into(),
            embedding_size: 384,
            completion_model: None,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            model_dir: None,
            batch_size: 32,
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: SearchMode,
    pub top_k: usize,
    pub hybrid_scale: f32,
    pub merge_policy: MergePolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let p = SearchParams::default();
        Self { mode: p.mode, top_k: p.top_k, hybrid_scale: p.hybrid_scale, merge_policy: p.merge_policy }
    }
}

impl SearchSettings {
    pub fn params(&self, file_name: Option<String>) -> SearchParams {
        SearchParams {
            mode: self.mode,
            top_k: self.top_k,
            hybrid_scale: self.hybrid_scale,
            file_name,
            merge_policy: self.merge_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 100, chunk_overlap: 20 }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Build from an explicit figment; defaults are merged underneath.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings =
            self.figment.extract().map_err(|e| Error::Configuration(format!("Failed to load settings: {e}")))?;
        validate(&settings)?;
        Ok(settings)
    }
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.embedding.embedding_size == 0 {
        return Err(Error::Configuration("embedding.embedding_size must be positive".into()));
    }
    if settings.embedding.batch_size == 0 {
        return Err(Error::Configuration("embedding.batch_size must be positive".into()));
    }
    if settings.chunking.chunk_size == 0 || settings.chunking.chunk_overlap >= settings.chunking.chunk_size {
        return Err(Error::Configuration(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            settings.chunking.chunk_overlap, settings.chunking.chunk_size
        )));
    }
    settings.search.params(None).validate().map_err(|e| Error::Configuration(e.to_string()))
}

/// `~` and `$VAR`/`${VAR}` expansion for configured paths. An unset
/// variable leaves the input untouched.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            tracing::debug!(path = raw, error = %e, "path left unexpanded");
            PathBuf::from(raw)
        }
    }
}

/// Expanded `path`, joined onto `base` unless it is already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, path: S) -> PathBuf {
    let expanded = expand_path(path);
    if expanded.is_absolute() {
        return expanded;
    }
    base.join(expanded)
}
