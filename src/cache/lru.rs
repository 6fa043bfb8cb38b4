//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::VecDeque;

use crate::cache::CacheKey;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug)]
pub struct LruTracker<K = CacheKey> {
    /// Order of keys by access time
    order: VecDeque<K>,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }
}

impl<K: PartialEq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    pub fn touch(&mut self, key: &K) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }

    // == Retain ==
    /// Keeps only the keys for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.order.retain(|k| keep(k));
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_back()
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.back()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyKind;

    fn pet(id: &str) -> CacheKey {
        CacheKey::entity(KeyKind::PetDetail, "u1", id)
    }

    #[test]
    fn test_lru_new() {
        let lru: LruTracker = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch(&pet("a"));
        lru.touch(&pet("b"));
        lru.touch(&pet("c"));
        lru.touch(&pet("a"));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&pet("b")));
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut lru = LruTracker::new();

        // touch order a, b, c then a, c, b leaves back-to-front: a, c, b
        for id in ["a", "b", "c", "a", "c", "b"] {
            lru.touch(&pet(id));
        }

        assert_eq!(lru.evict_oldest(), Some(pet("a")));
        assert_eq!(lru.evict_oldest(), Some(pet("c")));
        assert_eq!(lru.evict_oldest(), Some(pet("b")));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove_nonexistent_key() {
        let mut lru = LruTracker::new();

        lru.touch(&pet("a"));
        lru.remove(&pet("zzz"));

        assert_eq!(lru.len(), 1);
        assert!(lru.contains(&pet("a")));
    }

    #[test]
    fn test_lru_retain() {
        let mut lru = LruTracker::new();

        lru.touch(&pet("a"));
        lru.touch(&CacheKey::collection(KeyKind::PetCollection, "u1"));
        lru.touch(&pet("b"));

        lru.retain(|k| k.kind() != KeyKind::PetDetail);

        assert_eq!(lru.len(), 1);
        assert!(lru.contains(&CacheKey::collection(KeyKind::PetCollection, "u1")));
    }
}
