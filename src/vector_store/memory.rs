//! In-memory vector store.
//!
//! Brute-force cosine similarity over an owned list of records. Suitable for
//! tests and offline runs with up to a few thousand vectors.

use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    check_dimension, cosine_similarity, DeleteResult, IndexStats, MetadataFilter, VectorMatch,
    VectorRecord, VectorStore,
};
use crate::error::VectorStoreError;

/// Vector store held entirely in process memory.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of the record with `id`, if any.
    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, record: VectorRecord) -> Result<String, VectorStoreError> {
        check_dimension(self.dimension, &record.values)?;
        let id = record.id.clone();
        let mut records = self.records.write().await;
        records.retain(|r| r.id != id);
        records.push(record);
        debug!(id = %id, total = records.len(), "Upserted vector");
        Ok(id)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        check_dimension(self.dimension, vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut matches: Vec<VectorMatch> = records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        // stable: equal scores keep insertion order
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_one(&self, id: &str) -> Result<bool, VectorStoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn delete_many(&self, filter: &MetadataFilter) -> Result<DeleteResult, VectorStoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !filter.matches(&r.metadata));
        let deleted_count = (before - records.len()) as u64;
        debug!(field = %filter.field, value = %filter.value, deleted_count, "Deleted vectors");
        Ok(DeleteResult { deleted_count })
    }

    async fn describe_stats(&self) -> Result<IndexStats, VectorStoreError> {
        Ok(IndexStats {
            total_vector_count: self.records.read().await.len() as u64,
            dimension: self.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommonMetadata, DocumentMetadata, ProfileMetadata};

    fn meta(id: &str, owner: &str, text: &str) -> DocumentMetadata {
        DocumentMetadata::Profile(ProfileMetadata {
            common: CommonMetadata::new(id, text, owner),
            name: id.to_string(),
            skills: vec![],
            project_count: 0,
        })
    }

    fn record(id: &str, owner: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: meta(id, owner, "text"),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_query_returns_self_match() {
        let store = InMemoryVectorStore::new(3);
        let v = vec![0.2, 0.5, 0.9];
        store.upsert(record("a", "u1", v.clone())).await.unwrap();
        store.upsert(record("b", "u1", vec![1.0, 0.0, 0.0])).await.unwrap();

        let hits = store.query(&v, 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_upsert_replaces_metadata() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(VectorRecord {
                id: "a".into(),
                values: vec![1.0, 0.0],
                metadata: meta("a", "u1", "first"),
            })
            .await
            .unwrap();
        store
            .upsert(VectorRecord {
                id: "a".into(),
                values: vec![0.0, 1.0],
                metadata: meta("a", "u1", "second"),
            })
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let hits = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.text(), "second");
    }

    #[tokio::test]
    async fn test_query_orders_descending_with_stable_ties() {
        let store = InMemoryVectorStore::new(2);
        store.upsert(record("low", "u", vec![0.0, 1.0])).await.unwrap();
        store.upsert(record("tie1", "u", vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("tie2", "u", vec![2.0, 0.0])).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["tie1", "tie2", "low"]);
    }

    #[tokio::test]
    async fn test_query_applies_filter_before_top_k() {
        let store = InMemoryVectorStore::new(2);
        store.upsert(record("other", "u2", vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("mine", "u1", vec![0.5, 0.5])).await.unwrap();

        let filter = MetadataFilter::owner("u1");
        let hits = store.query(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "mine");
    }

    #[tokio::test]
    async fn test_delete_one() {
        let store = InMemoryVectorStore::new(2);
        store.upsert(record("a", "u", vec![1.0, 0.0])).await.unwrap();
        assert!(store.delete_one("a").await.unwrap());
        assert!(!store.delete_one("a").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_many_then_filtered_query_is_empty() {
        let store = InMemoryVectorStore::new(2);
        store.upsert(record("a", "u1", vec![1.0, 0.0])).await.unwrap();
        store.upsert(record("b", "u1", vec![0.0, 1.0])).await.unwrap();
        store.upsert(record("c", "u2", vec![1.0, 1.0])).await.unwrap();

        let filter = MetadataFilter::owner("u1");
        let result = store.delete_many(&filter).await.unwrap();
        assert_eq!(result.deleted_count, 2);

        let hits = store.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.describe_stats().await.unwrap().total_vector_count, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new(3);
        let err = store.upsert(record("a", "u", vec![1.0])).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
        assert!(store.query(&[1.0], 1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_describe_stats() {
        let store = InMemoryVectorStore::new(4);
        let stats = store.describe_stats().await.unwrap();
        assert_eq!(
            stats,
            IndexStats {
                total_vector_count: 0,
                dimension: 4
            }
        );
    }
}
