//! In-process expiring key/value store with content-aware write suppression.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::policy::ExpirationPolicy;
use super::traits::{CacheKeyDetail, CacheStats, Cacheable};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A cached value with its expiration bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<V> {
    value: Arc<V>,
    policy: ExpirationPolicy,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, policy: ExpirationPolicy, now: Instant) -> Self {
        Self {
            value: Arc::new(value),
            policy,
            expires_at: policy.deadline(now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.policy
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    suppressed_writes: AtomicU64,
}

/// Expiring map from domain key to immutable snapshots.
///
/// Readers get `Arc<V>` snapshots; a write always replaces the whole entry so
/// a reader never observes a partially updated value. Two writers racing on
/// the same key resolve last-write-wins.
#[derive(Debug)]
pub struct TieredCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    counters: CacheCounters,
    closed: AtomicBool,
}

impl<V: Cacheable> Default for TieredCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Cacheable> TieredCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            counters: CacheCounters::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Live value for `key`. Expired entries are removed and reported absent.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether a live entry exists, without touching hit/miss counters.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Store `value` under `key`.
    ///
    /// Returns `false` without modifying anything when the live entry already
    /// holds the same content, or when the cache has been shut down.
    pub fn set(&self, key: impl Into<String>, value: V, policy: ExpirationPolicy) -> bool {
        let key = key.into();
        if self.closed.load(Ordering::Acquire) {
            debug!(key = %key, "cache closed, write dropped");
            return false;
        }

        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if !current.is_expired(now) && current.value.same_content(&value) {
                    self.counters.suppressed_writes.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                occupied.insert(CacheEntry::new(value, policy, now));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, policy, now));
            }
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove `key` regardless of its policy.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Clear all entries and refuse further writes.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        debug!("cache shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Counters plus a per-key size estimate from JSON serialization.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut keys: Vec<CacheKeyDetail> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| {
                let size_bytes = serde_json::to_vec(entry.value.as_ref())
                    .map(|bytes| bytes.len() as u64)
                    .unwrap_or(0);
                CacheKeyDetail {
                    key: entry.key().clone(),
                    size_bytes,
                    size_mb: size_bytes as f64 / BYTES_PER_MB,
                    list_count: entry.value.list_count(),
                    expires_in_secs: entry
                        .expires_at
                        .map(|deadline| deadline.saturating_duration_since(now).as_secs()),
                }
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));

        let total_bytes: u64 = keys.iter().map(|k| k.size_bytes).sum();
        CacheStats {
            item_count: keys.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            suppressed_writes: self.counters.suppressed_writes.load(Ordering::Relaxed),
            cache_size_mb: total_bytes as f64 / BYTES_PER_MB,
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use matchday_core::{DayRecordSet, MatchRecord};
    use serde_json::json;
    use std::time::Duration;

    fn record(id: &str) -> MatchRecord {
        serde_json::from_value(json!({"saishi_id": id, "start_time": "100"})).unwrap()
    }

    fn day(ids: &[&str]) -> DayRecordSet {
        DayRecordSet::new(
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            "6月20日 星期五",
            ids.iter().map(|id| record(id)).collect(),
        )
    }

    #[tokio::test]
    async fn test_get_miss_then_hit() {
        let cache = TieredCache::new();
        assert!(cache.get("finished:2025-06-20").is_none());

        assert!(cache.set("finished:2025-06-20", day(&["1"]), ExpirationPolicy::Never));
        let hit = cache.get("finished:2025-06-20").unwrap();
        assert_eq!(hit.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_equal_content_write_is_suppressed() {
        let cache = TieredCache::new();
        let first = day(&["1", "2"]);
        let first_updated = first.updated_at;
        assert!(cache.set("k", first, ExpirationPolicy::Never));

        let mut second = day(&["1", "2"]);
        second.updated_at = first_updated + chrono::Duration::seconds(10);
        assert!(!cache.set("k", second, ExpirationPolicy::Never));

        assert_eq!(cache.get("k").unwrap().updated_at, first_updated);
        assert_eq!(cache.stats().suppressed_writes, 1);
    }

    #[tokio::test]
    async fn test_changed_content_replaces_entry() {
        let cache = TieredCache::new();
        cache.set("k", day(&["1"]), ExpirationPolicy::Never);
        assert!(cache.set("k", day(&["1", "2"]), ExpirationPolicy::Never));
        assert_eq!(cache.get("k").unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TieredCache::new();
        cache.set("k", day(&["1"]), ExpirationPolicy::After(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_accepts_equal_content() {
        let cache = TieredCache::new();
        cache.set("k", day(&["1"]), ExpirationPolicy::After(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.set("k", day(&["1"]), ExpirationPolicy::Never));
        assert!(cache.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = TieredCache::new();
        cache.set("a", day(&["1"]), ExpirationPolicy::After(Duration::from_secs(10)));
        cache.set("b", day(&["2"]), ExpirationPolicy::Never);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = TieredCache::new();
        cache.set("k", day(&["1"]), ExpirationPolicy::Never);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(!cache.contains("k"));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_writes() {
        let cache = TieredCache::new();
        cache.set("k", day(&["1"]), ExpirationPolicy::Never);
        cache.shutdown();
        assert!(cache.is_empty());
        assert!(!cache.set("k", day(&["1"]), ExpirationPolicy::Never));
        assert!(cache.is_closed());
    }

    #[tokio::test]
    async fn test_stats_key_details() {
        let cache = TieredCache::new();
        cache.set("finished:2025-06-20", day(&["1", "2", "3"]), ExpirationPolicy::Never);
        cache.set(
            "finished:2025-04-01",
            day(&["9"]),
            ExpirationPolicy::After(Duration::from_secs(3600)),
        );

        let stats = cache.stats();
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.keys[0].key, "finished:2025-04-01");
        assert!(stats.keys[0].expires_in_secs.is_some());
        assert_eq!(stats.keys[1].list_count, 3);
        assert_eq!(stats.keys[1].expires_in_secs, None);
        assert!(stats.keys.iter().all(|k| k.size_bytes > 0));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::NaiveDate;
    use matchday_core::DayRecordSet;
    use proptest::prelude::*;
    use serde_json::json;

    fn day(ids: &[u32]) -> DayRecordSet {
        DayRecordSet::new(
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            "6月20日 星期五",
            ids.iter()
                .map(|id| serde_json::from_value(json!({"saishi_id": id.to_string()})).unwrap())
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn prop_second_write_applies_iff_content_differs(
            first in prop::collection::vec(0u32..20, 0..6),
            second in prop::collection::vec(0u32..20, 0..6),
        ) {
            let cache = TieredCache::new();
            prop_assert!(cache.set("k", day(&first), ExpirationPolicy::Never));
            let applied = cache.set("k", day(&second), ExpirationPolicy::Never);
            prop_assert_eq!(applied, first != second);
            prop_assert_eq!(cache.len(), 1);
        }
    }
}
