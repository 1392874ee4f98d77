//! Qdrant-backed vector store.
//!
//! Qdrant point ids must be integers or UUIDs, so each string record id is
//! mapped to a deterministic UUIDv5 and the original id is kept in the payload
//! under `doc_id`. The typed metadata is stored flat in the payload, which is
//! what makes `MetadataFilter` a plain `match` condition on the server side.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, GetPointsBuilder, PointId, PointStruct, PointsIdsList, QueryPointsBuilder,
    ScoredPoint, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    check_dimension, DeleteResult, IndexStats, MetadataFilter, VectorMatch, VectorRecord,
    VectorStore,
};
use crate::config::VectorStoreConfig;
use crate::error::VectorStoreError;
use crate::model::DocumentMetadata;

/// Payload key holding the original record id.
const DOC_ID_KEY: &str = "doc_id";

/// Vector store backed by a Qdrant collection.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    /// Build a client for the configured server. Does not touch the network.
    pub fn connect(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key())
            .build()
            .map_err(|e| VectorStoreError::Unavailable(format!("qdrant client: {}", e)))?;
        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.dimension,
        })
    }

    /// Create the collection (cosine distance) if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable)?;
        if exists {
            return Ok(());
        }

        info!(collection = %self.collection, dimension = self.dimension, "Creating Qdrant collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Unavailable(err.to_string())
}

/// Deterministic Qdrant point id for a record id.
pub(crate) fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

/// Flat JSON payload: metadata fields plus `doc_id`.
pub(crate) fn payload_json(record_id: &str, metadata: &DocumentMetadata) -> serde_json::Value {
    let mut json = metadata.to_json();
    if let Some(map) = json.as_object_mut() {
        map.insert(DOC_ID_KEY.to_string(), serde_json::Value::from(record_id));
    }
    json
}

/// Server-side equivalent of `MetadataFilter::matches`.
pub(crate) fn to_qdrant_filter(filter: &MetadataFilter) -> Filter {
    Filter::must([Condition::matches(
        filter.field.clone(),
        filter.value.clone(),
    )])
}

/// Rebuild a match from a scored point, skipping points we cannot decode.
fn decode_point(point: ScoredPoint) -> Option<VectorMatch> {
    let json = serde_json::Value::Object(
        point
            .payload
            .into_iter()
            .map(|(key, value)| (key, value.into_json()))
            .collect(),
    );
    let id = json.get(DOC_ID_KEY)?.as_str()?.to_string();
    match serde_json::from_value::<DocumentMetadata>(json) {
        Ok(metadata) => Some(VectorMatch {
            id,
            score: point.score,
            metadata,
        }),
        Err(e) => {
            warn!(id = %id, error = %e, "Skipping point with undecodable metadata");
            None
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, record: VectorRecord) -> Result<String, VectorStoreError> {
        check_dimension(self.dimension, &record.values)?;
        let payload = Payload::try_from(payload_json(&record.id, &record.metadata))
            .map_err(|e| VectorStoreError::Metadata(e.to_string()))?;
        let point = PointStruct::new(point_id(&record.id), record.values, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(unavailable)?;
        Ok(record.id)
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

        let mut request = QueryPointsBuilder::new(&self.collection)
            .query(vector.to_vec())
            .limit(top_k as u64)
            .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(to_qdrant_filter(filter));
        }

        match self.client.query(request).await {
            Ok(response) => Ok(response.result.into_iter().filter_map(decode_point).collect()),
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Vector query failed, returning no matches");
                Ok(Vec::new())
            }
        }
    }

    async fn delete_one(&self, id: &str) -> Result<bool, VectorStoreError> {
        let pid: PointId = point_id(id).into();
        let existing = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, vec![pid.clone()]))
            .await
            .map_err(unavailable)?;
        if existing.result.is_empty() {
            return Ok(false);
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: vec![pid] })
                    .wait(true),
            )
            .await
            .map_err(unavailable)?;
        Ok(true)
    }

    async fn delete_many(&self, filter: &MetadataFilter) -> Result<DeleteResult, VectorStoreError> {
        let qfilter = to_qdrant_filter(filter);
        let count = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(qfilter.clone())
                    .exact(true),
            )
            .await
            .map_err(unavailable)?
            .result
            .map(|r| r.count)
            .unwrap_or(0);

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(qfilter)
                    .wait(true),
            )
            .await
            .map_err(unavailable)?;
        Ok(DeleteResult {
            deleted_count: count,
        })
    }

    async fn describe_stats(&self) -> Result<IndexStats, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(IndexStats {
                total_vector_count: info.result.and_then(|r| r.points_count).unwrap_or(0),
                dimension: self.dimension,
            }),
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Index stats unavailable");
                Ok(IndexStats {
                    total_vector_count: 0,
                    dimension: self.dimension,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommonMetadata, ProfileMetadata};

    fn meta() -> DocumentMetadata {
        DocumentMetadata::Profile(ProfileMetadata {
            common: CommonMetadata::new("u1", "Name: Ada", "u1"),
            name: "Ada".into(),
            skills: vec!["React".into()],
            project_count: 0,
        })
    }

    #[test]
    fn test_point_id_is_deterministic_uuid() {
        let a = point_id("profile-u1");
        assert_eq!(a, point_id("profile-u1"));
        assert_ne!(a, point_id("profile-u2"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_payload_carries_doc_id_and_metadata() {
        let json = payload_json("profile-u1", &meta());
        assert_eq!(json["doc_id"], "profile-u1");
        assert_eq!(json["type"], "profile");
        assert_eq!(json["ownerId"], "u1");
        assert!(Payload::try_from(json).is_ok());
    }

    #[test]
    fn test_payload_still_decodes_as_metadata() {
        // doc_id is an extra field and must not break decoding
        let json = payload_json("profile-u1", &meta());
        let back: DocumentMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta());
    }

    #[test]
    fn test_filter_becomes_single_must_condition() {
        let filter = to_qdrant_filter(&MetadataFilter::owner("u1"));
        assert_eq!(filter.must.len(), 1);
        assert!(filter.should.is_empty());
    }

    #[test]
    fn test_connect_builds_client_without_network() {
        let config = VectorStoreConfig::default();
        assert!(QdrantVectorStore::connect(&config).is_ok());
    }
}
