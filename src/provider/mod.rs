//! Embedding and completion provider client.
//!
//! Services receive an explicitly constructed provider as
//! `Arc<dyn EmbeddingProvider>`; there is no process-wide client.
//!
//! - [`OpenAiClient`]: OpenAI-compatible HTTP API with exponential backoff
//! - [`HashingProvider`]: deterministic local embeddings for offline runs

mod offline;
mod openai;
mod retry;

pub use offline::HashingProvider;
pub use openai::OpenAiClient;
pub use retry::{AttemptError, RetryPolicy};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;

/// Remote (or local) model producing embeddings and chat completions.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Length of every vector returned by [`embed`](Self::embed).
    fn dimensions(&self) -> usize;

    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Run one chat completion with a system and a user turn.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

/// Reject empty input before it reaches the network.
pub fn validate_text(text: &str) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::InvalidInput(
            "text must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build the provider selected in the configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match config.kind {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        ProviderKind::Offline => Ok(Arc::new(HashingProvider::new(config.dimensions))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("hello").is_ok());
        assert!(matches!(
            validate_text("   \n"),
            Err(ProviderError::InvalidInput(_))
        ));
        assert!(matches!(validate_text(""), Err(ProviderError::InvalidInput(_))));
    }

    #[test]
    fn test_build_offline_provider() {
        let config = ProviderConfig {
            kind: ProviderKind::Offline,
            ..Default::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "offline");
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn test_build_openai_provider_requires_key() {
        let config = ProviderConfig {
            api_key_env: "TALENT_SEARCH_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
