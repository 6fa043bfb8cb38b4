//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A serialized snapshot plus the metadata needed to judge its staleness.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored JSON snapshot
    pub value: String,
    /// When the snapshot was written
    pub stored_at: DateTime<Utc>,
    /// Time to live, None = never stale (still explicitly invalidatable)
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// # Arguments
    /// * `value` - The serialized snapshot
    /// * `ttl` - Optional time to live
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
            ttl,
        }
    }

    // == Age ==
    /// Time elapsed between `stored_at` and `now`; zero if the clock went backwards.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or_default()
    }

    // == Is Stale ==
    /// Checks if the entry is stale at the given instant.
    ///
    /// Boundary condition: an entry is stale only once its age is strictly
    /// greater than the TTL. Entries without a TTL never go stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => self.age_at(now) > ttl,
            None => false,
        }
    }

    /// Checks if the entry is stale now.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry is stale
    /// - `Some(remaining)` if the entry has a TTL and is still fresh
    /// - `None` if the entry has no TTL
    pub fn ttl_remaining(&self) -> Option<Duration> {
        let age = self.age_at(Utc::now());
        self.ttl.map(|ttl| ttl.saturating_sub(age))
    }
}
