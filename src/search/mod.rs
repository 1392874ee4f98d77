//! Retrieval and answer generation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐     ┌────────────────┐  miss  ┌───────────────────┐
//! │  query  │────▶│  ResultCache   │───────▶│ EmbeddingProvider │
//! └─────────┘     │  (moka, TTL)   │        └─────────┬─────────┘
//!                 └───────▲────────┘                  │ [f32; 1536]
//!                         │                           ▼
//!                         │ hits ≥ 0.05       ┌───────────────┐
//!                         └───────────────────│  VectorStore  │
//!                                             └───────────────┘
//!                                                     │
//!                                                     ▼
//!                                          ┌────────────────────┐
//!                                          │ ResponseGenerator  │
//!                                          │ hits ≥ 0.8 → model │
//!                                          └────────────────────┘
//! ```
//!
//! The two thresholds are independent: a wide recall net for search, a
//! strict bar for what the model may quote.

mod cache;
mod response;
mod semantic;

pub use cache::{cache_key, CacheEntry, ResultCache};
pub use response::{assemble_context, extract_sources, ResponseGenerator, SYSTEM_PROMPT};
pub use semantic::{SearchOptions, SemanticSearch};

use crate::error::Result;
use crate::model::ChatResponse;

/// Search, then answer from the hits.
pub async fn answer(
    search: &SemanticSearch,
    generator: &ResponseGenerator,
    query: &str,
    max_results: usize,
) -> Result<ChatResponse> {
    let results = search
        .search(query, max_results, &SearchOptions::default())
        .await?;
    Ok(generator.generate_response(query, &results).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResponseConfig, SearchConfig};
    use crate::testing::{profile_record, StubProvider};
    use crate::vector_store::{InMemoryVectorStore, VectorStore};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_answer_runs_search_then_generation() {
        let provider = Arc::new(StubProvider::new(vec![1.0, 0.0]).with_completion("Ada."));
        let store = Arc::new(InMemoryVectorStore::new(2));
        store
            .upsert(profile_record("a", "a", "Name: Ada", vec![1.0, 0.0]))
            .await
            .unwrap();
        let search = SemanticSearch::new(
            provider.clone(),
            store,
            ResultCache::with_ttl(Duration::from_secs(60), 10),
            SearchConfig::default(),
        );
        let generator = ResponseGenerator::new(provider.clone(), ResponseConfig::default());

        let response = answer(&search, &generator, "who?", 5).await.unwrap();
        assert_eq!(response.response, "Ada.");
        assert_eq!(response.sources.profiles, vec!["a".to_string()]);
        assert_eq!(provider.embeds(), 1);
        assert_eq!(provider.completions(), 1);
    }

    #[tokio::test]
    async fn test_answer_maps_invalid_input() {
        let provider = Arc::new(StubProvider::new(vec![1.0]));
        let search = SemanticSearch::new(
            provider.clone(),
            Arc::new(InMemoryVectorStore::new(1)),
            ResultCache::with_ttl(Duration::from_secs(60), 10),
            SearchConfig::default(),
        );
        let generator = ResponseGenerator::new(provider, ResponseConfig::default());
        let err = answer(&search, &generator, "", 5).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
