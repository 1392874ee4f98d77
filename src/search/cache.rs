//! Search result cache.
//!
//! Entries live for a fixed TTL and are never served once expired. The cache
//! has no hard capacity: once the entry count passes `max_entries`, expired
//! entries are swept, young ones always survive.

use chrono::Utc;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::CacheConfig;
use crate::metrics::{CACHE_HITS, CACHE_MISSES};
use crate::model::SearchResult;
use crate::vector_store::MetadataFilter;

/// A cached result list.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub results: Vec<SearchResult>,
    /// Insertion time, epoch milliseconds.
    pub timestamp: i64,
}

/// Deterministic key over every parameter that changes the result.
pub fn cache_key(
    query: &str,
    limit: usize,
    threshold: f32,
    filter: Option<&MetadataFilter>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update([0u8]);
    hasher.update((limit as u64).to_le_bytes());
    hasher.update(threshold.to_bits().to_le_bytes());
    if let Some(filter) = filter {
        hasher.update([1u8]);
        hasher.update(filter.field.as_bytes());
        hasher.update([0u8]);
        hasher.update(filter.value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// TTL cache of search results.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<String, CacheEntry>,
    ttl: Duration,
    max_entries: u64,
    /// Entry count seen by the last sweep plus inserts since; moka's own
    /// count lags until its pending writes are applied.
    counted: Arc<AtomicU64>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_ttl(config.ttl(), config.max_entries)
    }

    pub fn with_ttl(ttl: Duration, max_entries: u64) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
            ttl,
            max_entries,
            counted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh results for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Vec<SearchResult>> {
        match self.inner.get(key).await {
            Some(entry) => {
                metrics::counter!(CACHE_HITS).increment(1);
                debug!(key = %key, age_ms = Utc::now().timestamp_millis() - entry.timestamp, "Cache hit");
                Some(entry.results)
            }
            None => {
                metrics::counter!(CACHE_MISSES).increment(1);
                None
            }
        }
    }

    /// Store results under `key`, sweeping expired entries when over capacity.
    pub async fn insert(&self, key: String, results: Vec<SearchResult>) {
        let entry = CacheEntry {
            key: key.clone(),
            results,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.inner.insert(key, entry).await;

        if self.counted.fetch_add(1, Ordering::Relaxed) + 1 > self.max_entries {
            self.inner.run_pending_tasks().await;
            let live = self.inner.entry_count();
            self.counted.store(live, Ordering::Relaxed);
            debug!(entries = live, "Swept expired cache entries");
        }
    }

    /// Approximate number of live entries.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        self.counted.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;

    fn result(id: &str) -> SearchResult {
        SearchResult {
            content_type: ContentType::Profile,
            content_id: id.to_string(),
            content_text: "text".to_string(),
            similarity: 0.5,
        }
    }

    // ========================================================================
    // Keys
    // ========================================================================

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(cache_key("react", 5, 0.05, None), cache_key("react", 5, 0.05, None));
    }

    #[test]
    fn test_cache_key_covers_every_parameter() {
        let base = cache_key("react", 5, 0.05, None);
        assert_ne!(base, cache_key("vue", 5, 0.05, None));
        assert_ne!(base, cache_key("react", 6, 0.05, None));
        assert_ne!(base, cache_key("react", 5, 0.5, None));
        let filter = MetadataFilter::owner("u1");
        assert_ne!(base, cache_key("react", 5, 0.05, Some(&filter)));
        assert_ne!(
            cache_key("react", 5, 0.05, Some(&filter)),
            cache_key("react", 5, 0.05, Some(&MetadataFilter::owner("u2")))
        );
    }

    // ========================================================================
    // TTL
    // ========================================================================

    #[tokio::test]
    async fn test_insert_then_get() {
        let cache = ResultCache::with_ttl(Duration::from_secs(60), 10);
        cache.insert("k".into(), vec![result("a")]).await;
        assert_eq!(cache.get("k").await, Some(vec![result("a")]));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_served() {
        let cache = ResultCache::with_ttl(Duration::from_millis(50), 10);
        cache.insert("k".into(), vec![result("a")]).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_capacity_never_evicts_fresh_entries() {
        let cache = ResultCache::with_ttl(Duration::from_secs(60), 2);
        for i in 0..5 {
            cache.insert(format!("k{}", i), vec![result("a")]).await;
        }
        for i in 0..5 {
            assert!(cache.get(&format!("k{}", i)).await.is_some());
        }
        assert_eq!(cache.len().await, 5);
    }

    #[tokio::test]
    async fn test_capacity_sweep_drops_expired_entries() {
        let cache = ResultCache::with_ttl(Duration::from_millis(50), 1);
        cache.insert("old1".into(), vec![result("a")]).await;
        cache.insert("old2".into(), vec![result("b")]).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        cache.insert("fresh".into(), vec![result("c")]).await;
        // the sweep ran inside insert; read the raw count without syncing
        assert_eq!(cache.inner.entry_count(), 1);
        assert!(cache.get("fresh").await.is_some());
        assert!(cache.get("old1").await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResultCache::with_ttl(Duration::from_secs(60), 10);
        cache.insert("k".into(), vec![]).await;
        cache.clear().await;
        assert_eq!(cache.get("k").await, None);
    }
}
