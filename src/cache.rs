//! Expiring key-value cache
//!
//! Owned by whoever needs it; nothing here is process-wide. An entry is fresh
//! for `ttl` after it was stored and is never served once expired.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Fresh value for `key` as seen at `now`
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    /// Returns the cached value, or runs `loader` and caches its result when
    /// the entry is missing or expired. Loader errors are returned as-is and
    /// leave the cache untouched.
    pub fn get_or_refresh<E, F>(&mut self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_refresh_at(key, Instant::now(), loader)
    }

    pub fn get_or_refresh_at<E, F>(&mut self, key: K, now: Instant, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get_at(&key, now) {
            return Ok(value);
        }
        let value = loader()?;
        self.insert_at(key, value.clone(), now);
        Ok(value)
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops expired entries, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("formulas", 3, t0);

        assert_eq!(cache.get_at(&"formulas", t0 + Duration::from_secs(59)), Some(3));
        assert_eq!(cache.get_at(&"formulas", t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_refresh_runs_loader_only_when_stale() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        let mut loads = 0;

        let first: Result<u32, ()> = cache.get_or_refresh_at("k", t0, || {
            loads += 1;
            Ok(1)
        });
        assert_eq!(first, Ok(1));

        let cached: Result<u32, ()> = cache.get_or_refresh_at("k", t0 + Duration::from_secs(5), || {
            loads += 1;
            Ok(2)
        });
        assert_eq!(cached, Ok(1));

        let refreshed: Result<u32, ()> = cache.get_or_refresh_at("k", t0 + Duration::from_secs(11), || {
            loads += 1;
            Ok(3)
        });
        assert_eq!(refreshed, Ok(3));
        assert_eq!(loads, 2);
    }

    #[test]
    fn test_loader_error_keeps_cache_empty() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(10));
        let result = cache.get_or_refresh("k", || Err("backend down"));
        assert_eq!(result, Err("backend down"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_and_invalidate() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at(1, "old", t0);
        cache.insert_at(2, "new", t0 + Duration::from_secs(8));

        assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(&2), Some("new"));
        assert!(cache.is_empty());
    }
}
