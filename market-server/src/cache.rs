//! Generic TTL key-value cache
//!
//! Backs the prepay session cache, the order detail view and the
//! session-facing membership/purchase views. Entries expire lazily on
//! read; everything cached here can be rebuilt from the store, so a
//! miss is never an error.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent cache with per-entry TTL and lazy expiry
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert `value` under `key`, valid for `ttl` from now
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Get the value if present and unexpired; expired entries are dropped
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(key, |_, e| e.expires_at <= Instant::now());
        }
        None
    }

    /// Remove the entry, if any
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of entries, including ones not yet lazily expired
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let cache: TtlCache<i64, String> = TtlCache::new();
        cache.insert(1, "a".into(), Duration::from_secs(60));
        assert_eq!(cache.get(&1), Some("a".into()));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_overwrite() {
        let cache: TtlCache<i64, i32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_secs(60));
        cache.insert(1, 20, Duration::from_secs(60));
        assert_eq!(cache.get(&1), Some(20));
    }

    #[test]
    fn test_invalidate() {
        let cache: TtlCache<i64, i32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_secs(60));
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache: TtlCache<i64, i32> = TtlCache::new();
        cache.insert(1, 10, Duration::from_millis(20));
        assert_eq!(cache.get(&1), Some(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&1), None);
        // Lazy removal happened on read
        assert!(cache.is_empty());
    }
}
