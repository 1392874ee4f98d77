//! Talent search node.
//!
//! Semantic search and retrieval-augmented chat over developer profiles and
//! the projects they built:
//!
//! - [`search::SemanticSearch`]: embed a query, rank indexed documents, cache hits
//! - [`search::ResponseGenerator`]: answer from the relevant hits with sources
//! - [`queue::EmbeddingQueue`]: keep the index in sync with the system of record
//! - [`api::ApiServer`]: HTTP surface for all of the above

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod preprocessing;
pub mod provider;
pub mod queue;
pub mod search;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiServer, AppState};
pub use config::{AppConfig, DEFAULT_EMBEDDING_DIM};
pub use error::{Error, Result};
pub use crate::metrics::{MetricsConfig, MetricsService};
pub use model::{ChatResponse, ContentType, Document, Profile, Project, SearchResult, Sources};
pub use provider::{build_provider, EmbeddingProvider, HashingProvider, OpenAiClient};
pub use queue::{DocumentIndexer, EmbeddingQueue, MutationHooks, QueueStats};
pub use search::{ResponseGenerator, ResultCache, SearchOptions, SemanticSearch};
pub use vector_store::{build_vector_store, InMemoryVectorStore, MetadataFilter, VectorStore};
