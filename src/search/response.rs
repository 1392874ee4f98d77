//! Answer generation from search results.
//!
//! Only results at or above the relevance threshold reach the model. When
//! none do, the caller gets the configured clarification and the provider is
//! never called.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ResponseConfig;
use crate::error::GenerationError;
use crate::metrics::{CHAT_CLARIFICATIONS, CHAT_REQUESTS};
use crate::model::{ChatResponse, ContentType, Excerpt, SearchResult, Sources};
use crate::provider::EmbeddingProvider;

/// Instructions sent as the system turn.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about \
developers and the projects they have built. Answer using only the provided context. If the \
context does not contain the answer, say so and ask the user for more details.";

/// Turns relevant search results into an attributed answer.
pub struct ResponseGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    config: ResponseConfig,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: ResponseConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    pub async fn generate_response(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> Result<ChatResponse, GenerationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GenerationError::InvalidInput(
                "query must not be empty".into(),
            ));
        }

        let relevant: Vec<&SearchResult> = results
            .iter()
            .filter(|r| r.similarity >= self.config.relevance_threshold)
            .collect();

        if relevant.is_empty() {
            metrics::counter!(CHAT_CLARIFICATIONS).increment(1);
            info!(
                candidates = results.len(),
                threshold = self.config.relevance_threshold,
                "No relevant context, asking for clarification"
            );
            return Ok(ChatResponse {
                response: self.config.clarification.clone(),
                sources: Sources::default(),
            });
        }

        let context = assemble_context(&relevant);
        let user_prompt = format!("Context:\n{}\n\nQuestion: {}", context, query);
        debug!(relevant = relevant.len(), context_chars = context.len(), "Requesting answer");

        let response = self.provider.complete(SYSTEM_PROMPT, &user_prompt).await?;
        metrics::counter!(CHAT_REQUESTS).increment(1);

        Ok(ChatResponse {
            response,
            sources: extract_sources(&relevant, self.config.excerpt_chars),
        })
    }
}

/// Profiles, then projects, then other documents, each entry followed by a
/// `---` separator.
pub fn assemble_context(results: &[&SearchResult]) -> String {
    let mut context = String::new();
    for (content_type, heading) in [
        (ContentType::Profile, "Profile Information:"),
        (ContentType::Project, "Project Information:"),
        (ContentType::Document, "Additional Information:"),
    ] {
        let mut group = results
            .iter()
            .filter(|r| r.content_type == content_type)
            .peekable();
        if group.peek().is_none() {
            continue;
        }
        context.push('\n');
        context.push_str(heading);
        context.push('\n');
        for result in group {
            context.push_str(&result.content_text);
            context.push_str("\n---\n");
        }
    }
    context.trim().to_string()
}

/// De-duplicated ids per type plus a short excerpt for every result.
pub fn extract_sources(results: &[&SearchResult], excerpt_chars: usize) -> Sources {
    let mut sources = Sources::default();
    for result in results {
        let ids = match result.content_type {
            ContentType::Profile => &mut sources.profiles,
            ContentType::Project => &mut sources.projects,
            ContentType::Document => &mut sources.documents,
        };
        if !ids.contains(&result.content_id) {
            ids.push(result.content_id.clone());
        }
        sources.excerpts.push(Excerpt {
            content_type: result.content_type,
            id: result.content_id.clone(),
            text: excerpt(&result.content_text, excerpt_chars),
        });
    }
    sources
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProvider;

    fn result(content_type: ContentType, id: &str, text: &str, similarity: f32) -> SearchResult {
        SearchResult {
            content_type,
            content_id: id.to_string(),
            content_text: text.to_string(),
            similarity,
        }
    }

    fn generator() -> (Arc<StubProvider>, ResponseGenerator) {
        let provider = Arc::new(StubProvider::new(vec![1.0]).with_completion("Ada knows React."));
        let generator = ResponseGenerator::new(provider.clone(), ResponseConfig::default());
        (provider, generator)
    }

    // ========================================================================
    // Relevance threshold
    // ========================================================================

    #[tokio::test]
    async fn test_no_relevant_results_returns_clarification_without_completion() {
        let (provider, generator) = generator();
        let results = vec![
            result(ContentType::Profile, "a", "Name: Ada", 0.79),
            result(ContentType::Project, "b", "Title: Bot", 0.3),
        ];

        let response = generator.generate_response("who?", &results).await.unwrap();
        assert_eq!(
            response.response,
            "Could you please provide more details about what you are looking for?"
        );
        assert!(response.sources.is_empty());
        assert!(response.sources.excerpts.is_empty());
        assert_eq!(provider.completions(), 0);
    }

    #[tokio::test]
    async fn test_empty_results_return_clarification() {
        let (provider, generator) = generator();
        let response = generator.generate_response("who?", &[]).await.unwrap();
        assert_eq!(response.response, generator.config().clarification);
        assert_eq!(provider.completions(), 0);
    }

    #[tokio::test]
    async fn test_relevant_results_call_model_once() {
        let (provider, generator) = generator();
        let results = vec![
            result(ContentType::Profile, "a", "Name: Ada", 0.92),
            result(ContentType::Project, "b", "Title: Bot", 0.5),
            result(ContentType::Profile, "a", "Name: Ada (again)", 0.85),
        ];

        let response = generator.generate_response("who knows React?", &results).await.unwrap();
        assert_eq!(response.response, "Ada knows React.");
        assert_eq!(response.sources.profiles, vec!["a".to_string()]);
        assert!(response.sources.projects.is_empty());
        assert_eq!(response.sources.excerpts.len(), 2);
        assert_eq!(provider.completions(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (_, generator) = generator();
        let err = generator.generate_response(" ", &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(_)));
    }

    // ========================================================================
    // Context and sources
    // ========================================================================

    #[test]
    fn test_context_groups_profiles_before_projects() {
        let project = result(ContentType::Project, "p1", "Title: Bot", 0.9);
        let profile_a = result(ContentType::Profile, "a", "Name: Ada", 0.95);
        let profile_b = result(ContentType::Profile, "b", "Name: Bob", 0.85);
        let context = assemble_context(&[&project, &profile_a, &profile_b]);
        assert_eq!(
            context,
            "Profile Information:\nName: Ada\n---\nName: Bob\n---\n\nProject Information:\nTitle: Bot\n---"
        );
    }

    #[test]
    fn test_context_omits_empty_groups() {
        let project = result(ContentType::Project, "p1", "Title: Bot", 0.9);
        assert_eq!(
            assemble_context(&[&project]),
            "Project Information:\nTitle: Bot\n---"
        );
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn test_documents_follow_profiles_and_projects() {
        let note = result(ContentType::Document, "d1", "Met Ada at RustConf", 0.9);
        let profile = result(ContentType::Profile, "a", "Name: Ada", 0.95);
        assert_eq!(
            assemble_context(&[&note, &profile]),
            "Profile Information:\nName: Ada\n---\n\nAdditional Information:\nMet Ada at RustConf\n---"
        );
        let sources = extract_sources(&[&note, &profile], 200);
        assert_eq!(sources.documents, vec!["d1".to_string()]);
        assert_eq!(sources.profiles, vec!["a".to_string()]);
    }

    #[test]
    fn test_sources_keep_first_occurrence_order() {
        let items = [
            result(ContentType::Project, "p2", "x", 0.9),
            result(ContentType::Project, "p1", "y", 0.9),
            result(ContentType::Project, "p2", "z", 0.9),
        ];
        let refs: Vec<&SearchResult> = items.iter().collect();
        let sources = extract_sources(&refs, 200);
        assert_eq!(sources.projects, vec!["p2".to_string(), "p1".to_string()]);
        assert_eq!(sources.excerpts.len(), 3);
    }

    #[test]
    fn test_excerpt_truncation_is_char_safe() {
        assert_eq!(excerpt("short", 200), "short");
        let long = "é".repeat(250);
        let cut = excerpt(&long, 200);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
