//! Short-TTL caches for the rule snapshot and agent workloads.
//!
//! Caches are advisory. Every write bumps the cache generation before
//! invalidating, and a loader only keeps what it inserted if the generation
//! it observed before reading the store is still current, so a slow read can
//! never re-insert pre-write data.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::trace;

use crate::agent::AgentWorkload;
use crate::config::CacheConfig;
use crate::rules::RoutingRule;

/// A moka cache with a write-generation guard
pub struct GuardedCache<K, V> {
    name: &'static str,
    cache: Cache<K, V>,
    generation: AtomicU64,
}

impl<K, V> GuardedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { name, cache, generation: AtomicU64::new(0) }
    }

    /// Read this before loading from the store
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).await
    }

    /// Insert a freshly loaded value unless a write happened since `observed`
    pub async fn insert_if_current(&self, key: K, value: V, observed: u64) -> bool {
        if self.generation() != observed {
            trace!(cache = self.name, "Discarding load that raced a write");
            return false;
        }

        self.cache.insert(key.clone(), value).await;

        // A write that landed between the check and the insert
        if self.generation() != observed {
            self.cache.invalidate(&key).await;
            return false;
        }
        true
    }

    pub async fn invalidate(&self, key: &K) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }
}

/// Shared rule snapshot
pub type RuleSnapshot = Arc<Vec<RoutingRule>>;

/// Cache layer used by the rule store and the agent directory
pub struct RoutingCaches {
    pub rules: GuardedCache<(), RuleSnapshot>,
    pub workloads: GuardedCache<String, AgentWorkload>,
}

impl RoutingCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            rules: GuardedCache::new("rules", 16, config.rules_ttl()),
            workloads: GuardedCache::new(
                "workloads",
                config.max_workload_entries,
                config.workload_ttl(),
            ),
        }
    }

    pub fn clear(&self) {
        self.rules.invalidate_all();
        self.workloads.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> GuardedCache<String, u32> {
        GuardedCache::new("test", 100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_insert_with_current_generation() {
        let cache = cache();
        let observed = cache.generation();
        assert!(cache.insert_if_current("a".to_string(), 1, observed).await);
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn test_load_racing_a_write_is_discarded() {
        let cache = cache();
        let observed = cache.generation();

        // Write lands while the loader is still reading the store
        cache.invalidate(&"a".to_string()).await;

        assert!(!cache.insert_if_current("a".to_string(), 1, observed).await);
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache: GuardedCache<String, u32> =
            GuardedCache::new("ttl", 10, Duration::from_millis(50));
        let observed = cache.generation();
        cache.insert_if_current("a".to_string(), 1, observed).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }
}
