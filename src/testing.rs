//! Test doubles shared by unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ProviderError;
use crate::model::{CommonMetadata, DocumentMetadata, ProfileMetadata, ProjectMetadata};
use crate::provider::{validate_text, EmbeddingProvider};
use crate::vector_store::VectorRecord;

/// Provider returning a fixed vector and a fixed completion, counting calls.
pub struct StubProvider {
    vector: Mutex<Vec<f32>>,
    completion: String,
    failing_embeds: AtomicU32,
    embed_delay: Option<Duration>,
    pub embed_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector: Mutex::new(vector),
            completion: "stub answer".to_string(),
            failing_embeds: AtomicU32::new(0),
            embed_delay: None,
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_completion(mut self, completion: &str) -> Self {
        self.completion = completion.to_string();
        self
    }

    /// Sleep for `delay` inside every embed call.
    pub fn with_embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay = Some(delay);
        self
    }

    /// Fail the next `n` embed calls.
    pub fn fail_next_embeds(&self, n: u32) {
        self.failing_embeds.store(n, Ordering::SeqCst);
    }

    pub fn set_vector(&self, vector: Vec<f32>) {
        *self.vector.lock().unwrap() = vector;
    }

    pub fn embeds(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        self.vector.lock().unwrap().len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        validate_text(text)?;
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.embed_delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.failing_embeds.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_embeds.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Exhausted {
                attempts: 1,
                message: "stub failure".to_string(),
            });
        }
        Ok(self.vector.lock().unwrap().clone())
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        validate_text(user)?;
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.completion.clone())
    }
}

pub fn profile_record(id: &str, owner: &str, text: &str, values: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: format!("profile-{}", id),
        values,
        metadata: DocumentMetadata::Profile(ProfileMetadata {
            common: CommonMetadata::new(id, text, owner),
            name: id.to_string(),
            skills: vec![],
            project_count: 0,
        }),
    }
}

pub fn project_record(id: &str, owner: &str, text: &str, values: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: format!("project-{}", id),
        values,
        metadata: DocumentMetadata::Project(ProjectMetadata {
            common: CommonMetadata::new(id, text, owner),
            title: id.to_string(),
            techs: vec![],
            keywords: vec![],
            profile_name: String::new(),
        }),
    }
}
