//! Entry points called by the system of record after a mutation.

use std::sync::Arc;
use tracing::info;

use super::indexer::DocumentIndexer;
use super::worker::EmbeddingQueue;
use crate::error::Result;
use crate::model::{Profile, Project};
use crate::vector_store::DeleteResult;

/// Priority for single updates.
pub const DEFAULT_PRIORITY: f64 = 1.0;

/// Priority of the `index`-th item of a bulk batch of `len`: 1 down to just
/// above 0, so the batch is processed in order.
pub fn bulk_priority(index: usize, len: usize) -> f64 {
    if len == 0 {
        return DEFAULT_PRIORITY;
    }
    1.0 - index as f64 / len as f64
}

/// Mutation hooks feeding the embedding queue.
#[derive(Clone)]
pub struct MutationHooks {
    queue: Arc<EmbeddingQueue>,
    indexer: Arc<DocumentIndexer>,
}

impl MutationHooks {
    pub fn new(queue: Arc<EmbeddingQueue>, indexer: Arc<DocumentIndexer>) -> Self {
        Self { queue, indexer }
    }

    pub fn queue(&self) -> &Arc<EmbeddingQueue> {
        &self.queue
    }

    pub fn indexer(&self) -> &Arc<DocumentIndexer> {
        &self.indexer
    }

    pub async fn on_profile_update(&self, profile: Profile) {
        info!(id = %profile.id, "Profile update detected");
        self.queue
            .enqueue_profile_update(profile, DEFAULT_PRIORITY)
            .await;
    }

    pub async fn on_project_update(&self, project: Project) {
        info!(id = %project.id, "Project update detected");
        self.queue
            .enqueue_project_update(project, DEFAULT_PRIORITY)
            .await;
    }

    /// Drop pending jobs and indexed documents owned by the profile.
    pub async fn on_profile_delete(&self, profile_id: &str) -> Result<DeleteResult> {
        let cancelled = self.queue.cancel_owner(profile_id).await;
        let removed = self.indexer.remove_owner(profile_id).await?;
        info!(
            id = %profile_id,
            cancelled,
            deleted = removed.deleted_count,
            "Profile documents removed"
        );
        Ok(removed)
    }

    pub async fn bulk_update_profiles(&self, profiles: Vec<Profile>) -> usize {
        let len = profiles.len();
        info!(count = len, "Queueing bulk profile update");
        for (index, profile) in profiles.into_iter().enumerate() {
            self.queue
                .enqueue_profile_update(profile, bulk_priority(index, len))
                .await;
        }
        len
    }

    pub async fn bulk_update_projects(&self, projects: Vec<Project>) -> usize {
        let len = projects.len();
        info!(count = len, "Queueing bulk project update");
        for (index, project) in projects.into_iter().enumerate() {
            self.queue
                .enqueue_project_update(project, bulk_priority(index, len))
                .await;
        }
        len
    }
}
