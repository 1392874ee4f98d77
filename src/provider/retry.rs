//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::ProviderError;

/// Outcome of a single attempt that did not succeed.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying (timeouts, 429, 5xx, connection resets).
    Transient(String),
    /// Retrying cannot help; surfaced immediately.
    Permanent(ProviderError),
}

/// Retry policy: `max_retries` extra attempts after the first one, with the
/// delay doubling from `initial_delay` up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// A policy that never waits or retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay after the failed attempt number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial_delay.saturating_mul(multiplier), self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget
    /// is spent. The last transient error is reported on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let total_attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Permanent(err)) => return Err(err),
                Err(AttemptError::Transient(message)) => {
                    if attempt >= self.max_retries {
                        return Err(ProviderError::Exhausted {
                            attempts: total_attempts,
                            message,
                        });
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        total_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
