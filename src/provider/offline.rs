//! Deterministic local provider.
//!
//! Embeds text by hashing normalized tokens into a fixed number of buckets
//! (feature hashing) and L2-normalizing the result, so texts sharing words
//! score a positive cosine similarity. Completions are extractive: the
//! answer lists the headline lines of the supplied context.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{validate_text, EmbeddingProvider};
use crate::error::ProviderError;
use crate::preprocessing::normalize_text;

/// Offline stand-in for a hosted embedding model.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimensions: usize,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let value = u64::from_le_bytes(raw);
        let index = (value % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let normalized = normalize_text(text);
        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(token);
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Lines of the context worth quoting back.
fn headline_lines(context: &str) -> Vec<&str> {
    context
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("Name:") || l.starts_with("Title:"))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        validate_text(text)?;
        Ok(self.embed_sync(text))
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        validate_text(user_prompt)?;
        let context = user_prompt
            .split("\n\nQuestion:")
            .next()
            .unwrap_or_default()
            .trim_start_matches("Context:");
        let headlines = headline_lines(context);
        if headlines.is_empty() {
            return Ok("No matching profiles or projects were found in the provided context."
                .to_string());
        }
        Ok(format!("Relevant matches:\n- {}", headlines.join("\n- ")))
    }
}
