//! Node configuration.
//!
//! Configuration is read from a TOML file (see `talent-search init`) and
//! completed from the environment. Secrets never live in the file: API keys
//! are looked up through the environment variable named in the config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metrics::MetricsConfig;

/// Dimension of `text-embedding-3-small` vectors.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub vector_store: VectorStoreConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub response: ResponseConfig,
    pub queue: QueueConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Reject values that would make the services misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.provider.dimensions == 0 {
            return Err(Error::Config("provider.dimensions must be > 0".into()));
        }
        if self.vector_store.dimension != self.provider.dimensions {
            return Err(Error::Config(format!(
                "vector_store.dimension ({}) must match provider.dimensions ({})",
                self.vector_store.dimension, self.provider.dimensions
            )));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(Error::Config(
                "search.default_limit must be within [1, search.max_limit]".into(),
            ));
        }
        if self.queue.max_concurrent == 0 {
            return Err(Error::Config("queue.max_concurrent must be > 0".into()));
        }
        for (name, value) in [
            ("search.threshold", self.search.threshold),
            ("response.relevance_threshold", self.response.relevance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0, 1]", name)));
            }
        }
        if self.provider.retry.initial_delay_ms > self.provider.retry.max_delay_ms {
            return Err(Error::Config(
                "provider.retry.initial_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Which embedding/completion backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP API.
    OpenAi,
    /// Deterministic local embeddings, no network.
    Offline,
}

/// Embedding/completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chat_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIM,
            chat_model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the API key from the environment.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Exponential backoff settings for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Memory,
    Qdrant,
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: String,
    pub api_key_env: String,
    pub collection: String,
    pub dimension: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            url: "http://localhost:6334".to_string(),
            api_key_env: "QDRANT_API_KEY".to_string(),
            collection: "semantic-search".to_string(),
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl VectorStoreConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Semantic search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    /// Largest `limit` a caller may ask for.
    pub max_limit: usize,
    /// Recall threshold applied to raw vector scores.
    pub threshold: f32,
    /// Searches slower than this are logged.
    pub slow_search_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 100,
            threshold: 0.05,
            slow_search_ms: 1_000,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Response generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Relevance threshold, stricter than the search recall threshold.
    pub relevance_threshold: f32,
    pub excerpt_chars: usize,
    pub clarification: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.8,
            excerpt_chars: 200,
            clarification: "Could you please provide more details about what you are looking for?"
                .to_string(),
        }
    }
}

/// Embedding update queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub poll_interval_ms: u64,
    /// Subtracted from an item's priority each time it is requeued.
    pub retry_priority_penalty: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_retries: 3,
            poll_interval_ms: 1_000,
            retry_priority_penalty: 0.1,
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.provider.dimensions, 1536);
        assert_eq!(config.provider.retry.max_retries, 3);
        assert_eq!(config.provider.retry.initial_delay_ms, 1_000);
        assert_eq!(config.provider.retry.max_delay_ms, 10_000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.queue.max_concurrent, 5);
        assert!((config.search.threshold - 0.05).abs() < f32::EPSILON);
        assert!((config.response.relevance_threshold - 0.8).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.search.threshold = 0.3;
        config.vector_store.backend = VectorBackend::Qdrant;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert!((loaded.search.threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(loaded.vector_store.backend, VectorBackend::Qdrant);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str("[queue]\nmax_concurrent = 2\n").unwrap();
        assert_eq!(config.queue.max_concurrent, 2);
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut config = AppConfig::default();
        config.vector_store.dimension = 384;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must match"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.response.relevance_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_limit_above_max_rejected() {
        let mut config = AppConfig::default();
        config.search.max_limit = 3;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }
}
