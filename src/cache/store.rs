//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL
//! staleness. Values are opaque JSON snapshots; typed access lives in
//! [`SharedCache`](crate::cache::SharedCache).

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, CacheStats, KeyPattern, LruTracker, MAX_VALUE_SIZE};
use crate::error::{Result, SyncError};

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_entries` snapshots.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    // == Set ==
    /// Stores a snapshot under `key`, replacing any existing entry.
    ///
    /// If the cache is at capacity, the least recently used entry is evicted.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The serialized snapshot
    /// * `ttl` - Optional time to live; None means never stale
    pub fn set(&mut self, key: CacheKey, value: String, ttl: Option<Duration>) -> Result<()> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(SyncError::CacheCapacity(format!(
                "Snapshot for {} exceeds maximum size of {} bytes",
                key, MAX_VALUE_SIZE
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted_key) => {
                    debug!("Evicting least recently used entry {}", evicted_key);
                    self.entries.remove(&evicted_key);
                    self.stats.record_eviction();
                }
                None => {
                    return Err(SyncError::CacheCapacity(
                        "Cache is full and eviction failed".to_string(),
                    ));
                }
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Get ==
    /// Retrieves a snapshot by key.
    ///
    /// Returns None when the key is absent or stale; stale entries are
    /// removed and counted as misses.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let stale = match self.entries.get(key) {
            Some(entry) => entry.is_stale(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if stale {
            self.remove_entry(key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Exists ==
    /// True iff an entry is present and not stale. Does not touch LRU order
    /// or statistics.
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_stale())
            .unwrap_or(false)
    }

    // == Entry ==
    /// Returns the raw entry, stale or not.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Invalidate ==
    /// Removes exactly one entry. Returns false if it was absent.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        let removed = self.remove_entry(key);
        if removed {
            self.stats.record_invalidations(1);
        }
        removed
    }

    // == Invalidate Matching ==
    /// Removes every entry whose key matches `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_matching(&mut self, pattern: &KeyPattern) -> usize {
        let removed = self.remove_where(|key| pattern.matches(key));
        self.stats.record_invalidations(removed);
        removed
    }

    // == Clear Scope ==
    /// Removes every entry scoped to one owner.
    pub fn clear_scope(&mut self, owner_id: &str) -> usize {
        let removed = self.remove_where(|key| key.is_owned_by(owner_id));
        self.stats.record_invalidations(removed);
        removed
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(0);
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Records a snapshot that failed to encode or decode.
    pub fn record_serialization_failure(&mut self) {
        self.stats.record_serialization_failure();
    }

    // == Cleanup Expired ==
    /// Removes all stale entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let stale_keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale())
            .map(|(key, _)| key.clone())
            .collect();

        let count = stale_keys.len();

        for key in stale_keys {
            self.remove_entry(&key);
        }

        count
    }

    /// Snapshot of the keys currently held, stale ones included.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&CacheKey) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            let entries = &self.entries;
            self.lru.retain(|key| entries.contains_key(key));
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyKind;
    use std::thread::sleep;

    fn detail(owner: &str, id: &str) -> CacheKey {
        CacheKey::entity(KeyKind::PetDetail, owner, id)
    }

    fn pets(owner: &str) -> CacheKey {
        CacheKey::collection(KeyKind::PetCollection, owner)
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(100);

        store.set(pets("u1"), "[]".to_string(), None).unwrap();

        assert_eq!(store.get(&pets("u1")), Some("[]".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_missing_is_none() {
        let mut store = CacheStore::new(100);

        assert_eq!(store.get(&pets("u1")), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(100);

        store.set(pets("u1"), "[1]".to_string(), None).unwrap();
        store.set(pets("u1"), "[2]".to_string(), None).unwrap();

        assert_eq!(store.get(&pets("u1")), Some("[2]".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_stale_entry_is_a_miss() {
        let mut store = CacheStore::new(100);

        store
            .set(pets("u1"), "[]".to_string(), Some(Duration::from_millis(30)))
            .unwrap();
        assert!(store.exists(&pets("u1")));

        sleep(Duration::from_millis(60));

        assert!(!store.exists(&pets("u1")));
        assert_eq!(store.get(&pets("u1")), None);
        assert!(store.is_empty(), "stale entry is dropped on read");
    }

    #[test]
    fn test_exists_does_not_count_as_access() {
        let mut store = CacheStore::new(100);
        store.set(pets("u1"), "[]".to_string(), None).unwrap();

        assert!(store.exists(&pets("u1")));
        assert!(!store.exists(&pets("u2")));

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let mut store = CacheStore::new(100);
        store.set(detail("u1", "p1"), "{}".to_string(), None).unwrap();

        assert!(store.invalidate(&detail("u1", "p1")));
        assert!(!store.invalidate(&detail("u1", "p1")));
        assert_eq!(store.stats().invalidations, 1);
    }

    #[test]
    fn test_invalidate_matching_entity() {
        let mut store = CacheStore::new(100);
        store.set(detail("u1", "p1"), "{}".to_string(), None).unwrap();
        store
            .set(CacheKey::entity(KeyKind::ScanHistory, "u1", "p1"), "[]".to_string(), None)
            .unwrap();
        store
            .set(CacheKey::entity(KeyKind::ScanHistory, "u1", "p2"), "[]".to_string(), None)
            .unwrap();
        store.set(pets("u1"), "[]".to_string(), None).unwrap();

        let removed = store.invalidate_matching(&KeyPattern::any().entity("p1"));

        assert_eq!(removed, 2);
        assert!(store.exists(&pets("u1")));
        assert!(store.exists(&CacheKey::entity(KeyKind::ScanHistory, "u1", "p2")));
    }

    #[test]
    fn test_clear_scope_only_touches_owner() {
        let mut store = CacheStore::new(100);
        store.set(pets("u1"), "[]".to_string(), None).unwrap();
        store.set(detail("u1", "p1"), "{}".to_string(), None).unwrap();
        store.set(pets("u2"), "[]".to_string(), None).unwrap();

        assert_eq!(store.clear_scope("u1"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.exists(&pets("u2")));
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = CacheStore::new(2);

        store.set(detail("u1", "a"), "{}".to_string(), None).unwrap();
        store.set(detail("u1", "b"), "{}".to_string(), None).unwrap();
        // Access "a" so "b" becomes the eviction candidate
        store.get(&detail("u1", "a"));
        store.set(detail("u1", "c"), "{}".to_string(), None).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.exists(&detail("u1", "a")));
        assert!(!store.exists(&detail("u1", "b")));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_zero_capacity_refuses() {
        let mut store = CacheStore::new(0);

        let result = store.set(pets("u1"), "[]".to_string(), None);
        assert!(matches!(result, Err(SyncError::CacheCapacity(_))));
    }

    #[test]
    fn test_store_value_too_large() {
        let mut store = CacheStore::new(100);
        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);

        let result = store.set(pets("u1"), large_value, None);
        assert!(matches!(result, Err(SyncError::CacheCapacity(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100);

        store
            .set(detail("u1", "a"), "{}".to_string(), Some(Duration::from_millis(20)))
            .unwrap();
        store
            .set(detail("u1", "b"), "{}".to_string(), Some(Duration::from_secs(60)))
            .unwrap();
        store.set(detail("u1", "c"), "{}".to_string(), None).unwrap();

        sleep(Duration::from_millis(50));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 2);
    }
}
