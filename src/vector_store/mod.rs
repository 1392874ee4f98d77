//! Vector store adapters.
//!
//! Both backends implement [`VectorStore`] with the same contract:
//!
//! - `upsert` fully replaces any record with the same id
//! - `query` returns up to `top_k` records by descending cosine score, with
//!   an optional metadata equality filter applied inside the store
//! - `query`/`describe_stats` degrade to empty results when the backend is
//!   unreachable; `upsert`/`delete_*` propagate the failure
//!
//! ```text
//! ┌──────────────────┐        ┌─────────────────────┐
//! │ SemanticSearch   │──────▶ │ dyn VectorStore     │
//! │ DocumentIndexer  │        ├──────────┬──────────┤
//! └──────────────────┘        │ InMemory │  Qdrant  │
//!                             └──────────┴──────────┘
//! ```

mod memory;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{VectorBackend, VectorStoreConfig};
use crate::error::VectorStoreError;
use crate::model::DocumentMetadata;

/// A stored vector with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: DocumentMetadata,
}

/// One query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: DocumentMetadata,
}

/// Equality filter on a single metadata field.
///
/// Array-valued fields (e.g. `skills`) match when they contain the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Restrict to documents owned by `owner_id`.
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self::eq("ownerId", owner_id)
    }

    /// Evaluate the filter against typed metadata.
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        let json = metadata.to_json();
        match json.get(&self.field) {
            Some(value) => value_matches(value, &self.value),
            None => false,
        }
    }
}

fn value_matches(value: &serde_json::Value, expected: &str) -> bool {
    use serde_json::Value;
    match value {
        Value::String(s) => s == expected,
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Null | Value::Object(_) => false,
    }
}

/// Result of a filtered delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Index statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: usize,
}

/// Storage interface for embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Dimension every stored and queried vector must have.
    fn dimension(&self) -> usize;

    /// Insert or fully replace the record with `record.id`.
    async fn upsert(&self, record: VectorRecord) -> Result<String, VectorStoreError>;

    /// Nearest records by cosine similarity, highest first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Remove one record; `true` if it existed.
    async fn delete_one(&self, id: &str) -> Result<bool, VectorStoreError>;

    /// Remove every record matching `filter`.
    async fn delete_many(&self, filter: &MetadataFilter) -> Result<DeleteResult, VectorStoreError>;

    /// Record count and dimension.
    async fn describe_stats(&self) -> Result<IndexStats, VectorStoreError>;
}

/// Reject vectors of the wrong length.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), VectorStoreError> {
    if vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Build the store selected in the configuration.
pub async fn build_vector_store(
    config: &VectorStoreConfig,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.backend {
        VectorBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new(config.dimension))),
        VectorBackend::Qdrant => {
            let store = QdrantVectorStore::connect(config)?;
            store.ensure_collection().await?;
            Ok(Arc::new(store))
        }
    }
}
