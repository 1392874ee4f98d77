//! Error types for the search node.
//!
//! Each layer owns its own error enum so callers can tell a bad request from a
//! provider outage. The crate-level [`Error`] wraps all of them for the binary
//! and the HTTP surface.

use thiserror::Error;

/// Errors raised by the embedding/completion provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Empty or malformed text, rejected before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider kept failing until the retry budget ran out.
    #[error("Provider request failed after {attempts} attempt(s): {message}")]
    Exhausted { attempts: u32, message: String },

    /// Non-retryable rejection (bad key, bad request).
    #[error("Provider rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered, but not with the shape we expect.
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// Client could not be constructed (missing key, bad base URL).
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Errors raised by a vector store adapter.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Vector length does not match the index dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The backend could not be reached or refused the operation.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    /// Metadata could not be encoded for or decoded from the backend.
    #[error("Vector metadata error: {0}")]
    Metadata(String),
}

/// Errors surfaced by the semantic search service.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    InvalidInput(String),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Vector query failed: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors surfaced by the response generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid generation request: {0}")]
    InvalidInput(String),

    #[error("Completion failed: {0}")]
    Completion(#[from] ProviderError),
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Stable internal code reported to end users instead of the raw message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Search(SearchError::InvalidInput(_))
            | Error::Generation(GenerationError::InvalidInput(_))
            | Error::Provider(ProviderError::InvalidInput(_)) => "INVALID_INPUT",
            Error::Search(_) => "SEARCH_FAILED",
            Error::Generation(_) => "GENERATION_FAILED",
            Error::Provider(_) => "PROVIDER_FAILED",
            Error::VectorStore(_) => "VECTOR_STORE_FAILED",
            Error::Queue(_) => "QUEUE_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Api(_) | Error::Io(_) | Error::Serde(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self.code(), "INVALID_INPUT" | "NOT_FOUND")
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
