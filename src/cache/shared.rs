//! Shared Cache Handle
//!
//! Thread-safe, typed front for [`CacheStore`]. Every operation is
//! synchronous; serialization failures are logged and treated as misses.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, CacheStore, KeyPattern};

// == Shared Cache ==
/// Cloneable handle shared by every repository.
///
/// Each call takes the store lock once, so single-key operations are atomic.
/// There are no cross-key transactions.
#[derive(Debug, Clone)]
pub struct SharedCache {
    store: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    // == Constructor ==
    /// Creates a handle around a fresh store of the given capacity.
    pub fn new(max_entries: usize) -> Self {
        Self::from_store(CacheStore::new(max_entries))
    }

    /// Wraps an existing store.
    pub fn from_store(store: CacheStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheStore> {
        // The store holds no invariant a panicking writer could break halfway.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Returns the decoded value if present and fresh.
    ///
    /// A snapshot that no longer decodes is dropped and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let mut store = self.lock();
        let raw = store.get(key)?;

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                store.record_serialization_failure();
                store.invalidate(key);
                None
            }
        }
    }

    // == Set ==
    /// Persists a serialized snapshot of `value`, overwriting any previous entry.
    ///
    /// Failures are swallowed: caching is an optimization only.
    pub fn set<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize snapshot for {}: {}", key, e);
                self.lock().record_serialization_failure();
                return;
            }
        };

        let mut store = self.lock();
        if let Err(e) = store.set(key, raw, ttl) {
            warn!("Failed to cache snapshot: {}", e);
            store.record_serialization_failure();
        }
    }

    /// True iff an entry is present and not stale.
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.lock().exists(key)
    }

    /// Removes exactly one entry; no-op if absent.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().invalidate(key)
    }

    /// Removes every entry matching `pattern`.
    pub fn invalidate_matching(&self, pattern: &KeyPattern) -> usize {
        let removed = self.lock().invalidate_matching(pattern);
        if removed > 0 {
            debug!("Invalidated {} entries matching {}", removed, pattern);
        }
        removed
    }

    /// Removes every entry scoped to `owner_id`.
    pub fn clear_scope(&self, owner_id: &str) -> usize {
        self.lock().clear_scope(owner_id)
    }

    /// Removes every entry.
    pub fn clear(&self) -> usize {
        self.lock().clear()
    }

    /// Removes stale entries; returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        self.lock().cleanup_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyKind;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        id: String,
        name: String,
    }

    fn key() -> CacheKey {
        CacheKey::entity(KeyKind::PetDetail, "u1", "p1")
    }

    #[test]
    fn test_typed_round_trip() {
        let cache = SharedCache::new(10);
        let value = Snapshot {
            id: "p1".into(),
            name: "Max".into(),
        };

        cache.set(key(), &value, None);

        assert_eq!(cache.get::<Snapshot>(&key()), Some(value));
    }

    #[test]
    fn test_decode_failure_is_a_miss() {
        let cache = SharedCache::new(10);
        cache.set(key(), &vec![1, 2, 3], None);

        assert_eq!(cache.get::<Snapshot>(&key()), None);
        assert!(!cache.exists(&key()), "undecodable entry is dropped");
        assert_eq!(cache.stats().serialization_failures, 1);
    }

    #[test]
    fn test_encode_failure_is_swallowed() {
        let cache = SharedCache::new(10);
        // JSON object keys must be strings
        let mut bad: HashMap<Vec<u8>, u8> = HashMap::new();
        bad.insert(vec![1], 1);

        cache.set(key(), &bad, None);

        assert!(cache.is_empty());
        assert_eq!(cache.stats().serialization_failures, 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = SharedCache::new(10);
        let other = cache.clone();

        cache.set(key(), &"value", None);

        assert!(other.exists(&key()));
        other.invalidate(&key());
        assert!(!cache.exists(&key()));
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = SharedCache::new(1000);

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = CacheKey::entity(
                            KeyKind::PetDetail,
                            format!("u{}", worker),
                            format!("p{}", i),
                        );
                        cache.set(key, &i, None);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 400);
        assert_eq!(cache.clear_scope("u3"), 50);
    }
}
