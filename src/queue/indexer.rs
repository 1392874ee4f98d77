//! Job handler that embeds documents and writes them to the vector store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::item::{QueueItem, QueuePayload};
use super::worker::JobHandler;
use crate::error::{ProviderError, Result};
use crate::model::{Document, DocumentInput, Profile, Project};
use crate::preprocessing::{
    document_record_id, profile_document, project_document, text_document, within_input_limit,
    MAX_INPUT_CHARS,
};
use crate::provider::EmbeddingProvider;
use crate::vector_store::{DeleteResult, MetadataFilter, VectorRecord, VectorStore};

/// Builds, embeds and upserts profile, project and free-form documents.
///
/// Each owner carries a generation that `remove_owner` bumps. A document
/// embedded under an older generation is discarded instead of written, so a
/// job already past the queue cannot bring back a deleted owner's records.
pub struct DocumentIndexer {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generations: RwLock<HashMap<String, u64>>,
}

impl DocumentIndexer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            provider,
            store,
            generations: RwLock::new(HashMap::new()),
        }
    }

    /// Index a profile. `None` when the owner was removed mid-flight.
    pub async fn index_profile(&self, profile: &Profile) -> Result<Option<String>> {
        self.index(profile_document(profile)).await
    }

    pub async fn index_project(&self, project: &Project) -> Result<Option<String>> {
        self.index(project_document(project)).await
    }

    /// Index free-form text under `document_id`.
    pub async fn index_document(
        &self,
        document_id: &str,
        input: &DocumentInput,
    ) -> Result<Option<String>> {
        self.index(text_document(document_id, input)).await
    }

    /// Remove one free-form document. `false` when it was not indexed.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        let removed = self.store.delete_one(&document_record_id(document_id)).await?;
        debug!(id = %document_id, removed, "Document removal");
        Ok(removed)
    }

    /// Remove every document owned by `owner_id`.
    pub async fn remove_owner(&self, owner_id: &str) -> Result<DeleteResult> {
        let mut generations = self.generations.write().await;
        *generations.entry(owner_id.to_string()).or_insert(0) += 1;
        let removed = self
            .store
            .delete_many(&MetadataFilter::owner(owner_id))
            .await?;
        Ok(removed)
    }

    async fn generation(&self, owner_id: &str) -> u64 {
        self.generations
            .read()
            .await
            .get(owner_id)
            .copied()
            .unwrap_or(0)
    }

    async fn index(&self, document: Document) -> Result<Option<String>> {
        if !within_input_limit(&document.text) {
            return Err(ProviderError::InvalidInput(format!(
                "document {} exceeds {} characters",
                document.id, MAX_INPUT_CHARS
            ))
            .into());
        }

        let started = self.generation(&document.owner_id).await;
        let values = self.provider.embed(&document.text).await?;
        debug!(id = %document.id, owner = %document.owner_id, dims = values.len(), "Embedded document");

        // Held across the upsert so a concurrent owner removal waits for it.
        let generations = self.generations.read().await;
        let current = generations.get(&document.owner_id).copied().unwrap_or(0);
        if current != started {
            info!(id = %document.id, owner = %document.owner_id, "Owner removed while embedding, discarding document");
            return Ok(None);
        }
        let id = self
            .store
            .upsert(VectorRecord {
                id: document.id,
                values,
                metadata: document.metadata,
            })
            .await?;
        Ok(Some(id))
    }
}

#[async_trait]
impl JobHandler for DocumentIndexer {
    async fn handle(&self, item: &QueueItem) -> Result<()> {
        match &item.payload {
            QueuePayload::Profile(profile) => self.index_profile(profile).await?,
            QueuePayload::Project(project) => self.index_project(project).await?,
        };
        Ok(())
    }
}
