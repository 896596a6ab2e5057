// TTL caching for rendered feeds
// A small keyed cache with per-entry expiry; the global feed uses a single slot of it.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::infrastructure::clock::Clock;

/// Fixed key of the global feed slot.
pub const GLOBAL_FEED_KEY: &str = "index_page";

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, inserted_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at,
            ttl,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.inserted_at + self.ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keyed cache whose entries expire `default_ttl` after they were written.
/// Readers share a read lock; concurrent writers to one key are last-write-wins.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: CacheCounters,
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.default_ttl)
            .field("clock", &self.clock)
            .field("counters", &self.counters)
            .finish()
    }
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            clock,
            counters: CacheCounters::default(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Expired entries read as a miss; they are dropped on the next write or cleanup.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache entry expired");
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                None
            }
        }
    }

    pub async fn insert(&self, key: &str, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn insert_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
    }

    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len() as u64;
        entries.clear();
        self.counters.invalidations.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Single-slot cache for the global feed.
///
/// Writing a post does not touch this cache: readers may see content up to
/// `ttl` old. Only expiry or an explicit [`FeedCache::invalidate`] refreshes it.
pub struct FeedCache<V> {
    slot: TtlCache<V>,
}

impl<V> std::fmt::Debug for FeedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCache").field("slot", &self.slot).finish()
    }
}

impl<V: Clone + Send + Sync> FeedCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: TtlCache::new(ttl, clock),
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> Option<V> {
        self.slot.get(GLOBAL_FEED_KEY).await
    }

    #[instrument(skip(self, content))]
    pub async fn set(&self, content: V) {
        self.slot.insert(GLOBAL_FEED_KEY, content).await;
        debug!(ttl_secs = self.slot.default_ttl().num_seconds(), "global feed cached");
    }

    #[instrument(skip(self))]
    pub async fn invalidate(&self) {
        if self.slot.remove(GLOBAL_FEED_KEY).await {
            info!("global feed cache invalidated");
        }
    }

    pub fn ttl(&self) -> Duration {
        self.slot.default_ttl()
    }

    pub fn stats(&self) -> CacheStats {
        self.slot.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;

    fn feed_cache(clock: &ManualClock) -> FeedCache<String> {
        FeedCache::new(Duration::seconds(20), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_set_then_get_within_expiry() {
        let clock = ManualClock::starting_now();
        let cache = feed_cache(&clock);

        assert_eq!(cache.get().await, None);
        cache.set("X".to_string()).await;
        clock.advance(Duration::seconds(19));
        assert_eq!(cache.get().await, Some("X".to_string()));
    }

    #[tokio::test]
    async fn test_get_after_expiry_is_miss() {
        let clock = ManualClock::starting_now();
        let cache = feed_cache(&clock);

        cache.set("X".to_string()).await;
        clock.advance(Duration::seconds(21));
        assert_eq!(cache.get().await, None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_set_resets_expiry_last_write_wins() {
        let clock = ManualClock::starting_now();
        let cache = feed_cache(&clock);

        cache.set("old".to_string()).await;
        clock.advance(Duration::seconds(15));
        cache.set("new".to_string()).await;
        clock.advance(Duration::seconds(15));

        assert_eq!(cache.get().await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_clears_slot() {
        let clock = ManualClock::starting_now();
        let cache = feed_cache(&clock);

        cache.set("X".to_string()).await;
        cache.invalidate().await;
        assert_eq!(cache.get().await, None);
        assert_eq!(cache.stats().invalidations, 1);

        // Invalidating an empty slot is harmless
        cache.invalidate().await;
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_ttl_cache_cleanup_expired() {
        let clock = ManualClock::starting_now();
        let cache: TtlCache<u32> = TtlCache::new(Duration::seconds(10), Arc::new(clock.clone()));

        cache.insert("a", 1).await;
        cache.insert_with_ttl("b", 2, Duration::seconds(60)).await;
        clock.advance(Duration::seconds(30));

        assert_eq!(cache.cleanup_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("b").await, Some(2));
        assert!((cache.stats().hit_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_same_content() {
        let clock = ManualClock::starting_now();
        let cache = Arc::new(feed_cache(&clock));
        cache.set("shared".to_string()).await;

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await })
            })
            .collect();

        for reader in readers {
            assert_eq!(reader.await.unwrap(), Some("shared".to_string()));
        }
    }
}
