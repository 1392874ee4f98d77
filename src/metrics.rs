//! Prometheus metrics.
//!
//! Services record through the `metrics` facade macros; this module owns the
//! metric names and the Prometheus recorder whose handle renders `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const SEARCH_REQUESTS: &str = "search_requests_total";
pub const SEARCH_DURATION: &str = "search_duration_seconds";
pub const SEARCH_SLOW: &str = "search_slow_total";
pub const CACHE_HITS: &str = "search_cache_hits_total";
pub const CACHE_MISSES: &str = "search_cache_misses_total";
pub const CHAT_REQUESTS: &str = "chat_requests_total";
pub const CHAT_CLARIFICATIONS: &str = "chat_clarifications_total";
pub const QUEUE_LENGTH: &str = "embedding_queue_length";
pub const QUEUE_PROCESSED: &str = "embedding_jobs_processed_total";
pub const QUEUE_FAILED: &str = "embedding_jobs_failed_total";
pub const QUEUE_DROPPED: &str = "embedding_jobs_dropped_total";

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the recorder process-wide.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Holds the Prometheus handle used by the HTTP surface.
#[derive(Clone)]
pub struct MetricsService {
    handle: PrometheusHandle,
    installed: bool,
}

impl MetricsService {
    /// Install the global recorder, or fall back to a detached one when
    /// metrics are disabled or a recorder is already installed.
    pub fn new(config: MetricsConfig) -> Self {
        if config.enabled {
            match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => {
                    describe();
                    info!("Prometheus recorder installed");
                    return Self {
                        handle,
                        installed: true,
                    };
                }
                Err(e) => warn!(error = %e, "Prometheus recorder not installed"),
            }
        }
        Self::detached()
    }

    /// Recorder that is not wired to the `metrics` facade. Renders nothing.
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn describe() {
    metrics::describe_counter!(SEARCH_REQUESTS, "Semantic search requests");
    metrics::describe_histogram!(SEARCH_DURATION, "Semantic search latency in seconds");
    metrics::describe_counter!(SEARCH_SLOW, "Searches slower than the configured budget");
    metrics::describe_counter!(CACHE_HITS, "Result cache hits");
    metrics::describe_counter!(CACHE_MISSES, "Result cache misses");
    metrics::describe_counter!(CHAT_REQUESTS, "Chat responses generated");
    metrics::describe_counter!(CHAT_CLARIFICATIONS, "Chat requests answered with a clarification");
    metrics::describe_gauge!(QUEUE_LENGTH, "Pending embedding jobs");
    metrics::describe_counter!(QUEUE_PROCESSED, "Embedding jobs completed");
    metrics::describe_counter!(QUEUE_FAILED, "Embedding job attempts that failed");
    metrics::describe_counter!(QUEUE_DROPPED, "Embedding jobs dropped after exhausting retries");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_service_renders() {
        let service = MetricsService::detached();
        assert!(!service.is_installed());
        assert!(!service.render().contains(SEARCH_REQUESTS));
    }

    #[test]
    fn test_disabled_config_does_not_install() {
        let service = MetricsService::new(MetricsConfig { enabled: false });
        assert!(!service.is_installed());
    }
}
