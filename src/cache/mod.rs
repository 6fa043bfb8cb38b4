//! Cache Module
//!
//! Owner-scoped snapshot cache with TTL staleness, LRU eviction and
//! structured pattern invalidation.

mod entry;
mod key;
mod lru;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::{CacheKey, KeyKind, KeyPattern};
pub use lru::LruTracker;
pub use shared::SharedCache;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed snapshot size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
