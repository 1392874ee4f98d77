//! Semantic search over indexed profiles and projects.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::cache::{cache_key, ResultCache};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::metrics::{SEARCH_DURATION, SEARCH_REQUESTS, SEARCH_SLOW};
use crate::model::{ContentType, SearchResult};
use crate::provider::EmbeddingProvider;
use crate::vector_store::{MetadataFilter, VectorMatch, VectorStore};

/// Per-request overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Minimum similarity; falls back to the configured threshold.
    pub threshold: Option<f32>,
    /// Metadata filter pushed down to the vector store.
    pub filter: Option<MetadataFilter>,
}

impl SearchOptions {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Only documents owned by `owner_id`.
    pub fn owned_by(self, owner_id: impl Into<String>) -> Self {
        self.with_filter(MetadataFilter::owner(owner_id))
    }

    /// Only profiles or only projects.
    pub fn of_type(self, content_type: ContentType) -> Self {
        self.with_filter(MetadataFilter::eq("type", content_type.as_str()))
    }
}

/// Embeds queries, queries the store and caches the filtered hits.
pub struct SemanticSearch {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    cache: ResultCache,
    config: SearchConfig,
}

impl SemanticSearch {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        cache: ResultCache,
        config: SearchConfig,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Up to `limit` results with similarity at or above the threshold,
    /// highest first.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidInput("query must not be empty".into()));
        }
        if limit == 0 || limit > self.config.max_limit {
            return Err(SearchError::InvalidInput(format!(
                "limit must be within [1, {}]",
                self.config.max_limit
            )));
        }
        let threshold = options.threshold.unwrap_or(self.config.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SearchError::InvalidInput(format!(
                "threshold {} is outside [0, 1]",
                threshold
            )));
        }

        let key = cache_key(query, limit, threshold, options.filter.as_ref());
        if let Some(results) = self.cache.get(&key).await {
            return Ok(results);
        }

        metrics::counter!(SEARCH_REQUESTS).increment(1);
        let started = Instant::now();

        let embedding = self.provider.embed(query).await?;
        let matches = self
            .store
            .query(&embedding, limit.saturating_mul(2), options.filter.as_ref())
            .await?;
        let candidates = matches.len();
        let results: Vec<SearchResult> = matches
            .into_iter()
            .filter(|m| m.score >= threshold)
            .take(limit)
            .map(to_search_result)
            .collect();

        let elapsed = started.elapsed();
        metrics::histogram!(SEARCH_DURATION).record(elapsed.as_secs_f64());
        if elapsed.as_millis() as u64 > self.config.slow_search_ms {
            metrics::counter!(SEARCH_SLOW).increment(1);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.slow_search_ms,
                "Semantic search exceeded latency budget"
            );
        }
        debug!(
            candidates,
            returned = results.len(),
            threshold,
            elapsed_ms = elapsed.as_millis() as u64,
            "Semantic search complete"
        );

        // an empty list may come from a degraded backend; retry it next time
        if !results.is_empty() {
            self.cache.insert(key, results.clone()).await;
        }
        Ok(results)
    }
}

fn to_search_result(m: VectorMatch) -> SearchResult {
    let common = m.metadata.common();
    SearchResult {
        content_type: m.metadata.content_type(),
        content_id: common.id.clone(),
        content_text: common.text.clone(),
        similarity: m.score.clamp(0.0, 1.0),
    }
}
