//! OpenAI-compatible HTTP client.
//!
//! Speaks `POST /embeddings` and `POST /chat/completions`. Every request is
//! wrapped in the client's [`RetryPolicy`]; 408, 429, 5xx and transport
//! failures are retried, other 4xx responses fail immediately.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::{AttemptError, RetryPolicy};
use super::{validate_text, EmbeddingProvider};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible embeddings/completions API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    dimensions: usize,
    chat_model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Build a client, reading the API key from the configured env var.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key().ok_or_else(|| {
            ProviderError::NotConfigured(format!("{} is not set", config.api_key_env))
        })?;
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit API key.
    pub fn with_api_key(
        config: &ProviderConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: config.embedding_model.clone(),
            dimensions: config.dimensions,
            chat_model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// One POST attempt, classified for the retry loop.
    async fn post_once<B, T>(&self, path: &str, body: &B) -> Result<T, AttemptError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = truncate_error_body(&body);
            return Err(if is_retryable_status(status) {
                AttemptError::Transient(format!("{} returned {}: {}", path, status, message))
            } else {
                AttemptError::Permanent(ProviderError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            });
        }

        response.json::<T>().await.map_err(|e| {
            AttemptError::Permanent(ProviderError::Malformed(format!(
                "{} response could not be decoded: {}",
                path, e
            )))
        })
    }
}

/// Status codes worth another attempt.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn truncate_error_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Pull the single embedding out of a response and check its length.
fn extract_embedding(
    response: EmbeddingResponse,
    expected_dim: usize,
) -> Result<Vec<f32>, ProviderError> {
    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::Malformed("embedding response has no data".into()))?;
    if embedding.len() != expected_dim {
        return Err(ProviderError::Malformed(format!(
            "expected {} dimensions, got {}",
            expected_dim,
            embedding.len()
        )));
    }
    Ok(embedding)
}

fn extract_completion(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("completion response has no content".into()))
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        validate_text(text)?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
            encoding_format: "float",
        };
        debug!(model = %self.embedding_model, chars = text.len(), "Requesting embedding");

        let response: EmbeddingResponse = self
            .retry
            .run("embeddings", || self.post_once("embeddings", &request))
            .await?;
        extract_embedding(response, self.dimensions)
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        validate_text(user_prompt)?;
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(model = %self.chat_model, "Requesting completion");

        let response: ChatResponse = self
            .retry
            .run("chat.completions", || {
                self.post_once("chat/completions", &request)
            })
            .await?;
        extract_completion(response)
    }
}
