//! Configuration Module
//!
//! Handles loading sync-layer configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Sync layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Durations are expressed in seconds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache store can hold
    pub max_entries: usize,
    /// TTL for cached collections (drives background revalidation)
    pub collection_ttl: u64,
    /// TTL for cached entity details
    pub detail_ttl: u64,
    /// Interval between scheduled background refresh passes
    pub refresh_interval: u64,
    /// Interval between expired-entry sweeps of the cache store
    pub cleanup_interval: u64,
    /// Deadline for foreground network calls
    pub request_timeout: u64,
    /// Deadline for background refresh calls
    pub background_timeout: u64,
    /// Base URL of the remote API; the in-memory backend is used when unset
    pub api_base_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `COLLECTION_TTL` - Collection TTL in seconds (default: 300)
    /// - `DETAIL_TTL` - Detail TTL in seconds (default: 900)
    /// - `REFRESH_INTERVAL` - Background refresh frequency in seconds (default: 600)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `REQUEST_TIMEOUT` - Foreground request deadline in seconds (default: 30)
    /// - `BACKGROUND_TIMEOUT` - Background request deadline in seconds (default: 15)
    /// - `PETSYNC_API_URL` - Remote API base URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            collection_ttl: env_or("COLLECTION_TTL", defaults.collection_ttl),
            detail_ttl: env_or("DETAIL_TTL", defaults.detail_ttl),
            refresh_interval: env_or("REFRESH_INTERVAL", defaults.refresh_interval),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            request_timeout: env_or("REQUEST_TIMEOUT", defaults.request_timeout),
            background_timeout: env_or("BACKGROUND_TIMEOUT", defaults.background_timeout),
            api_base_url: env::var("PETSYNC_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Repository-facing view of the TTL and timeout settings.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            collection_ttl: Duration::from_secs(self.collection_ttl),
            detail_ttl: Duration::from_secs(self.detail_ttl),
            request_timeout: Duration::from_secs(self.request_timeout),
            background_timeout: Duration::from_secs(self.background_timeout),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            collection_ttl: 300,
            detail_ttl: 900,
            refresh_interval: 600,
            cleanup_interval: 60,
            request_timeout: 30,
            background_timeout: 15,
            api_base_url: None,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// == Cache Policy ==
/// TTLs and deadlines applied by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// TTL of the collection snapshot
    pub collection_ttl: Duration,
    /// TTL of per-entity detail snapshots
    pub detail_ttl: Duration,
    /// Deadline for foreground calls; errors propagate on expiry
    pub request_timeout: Duration,
    /// Deadline for background refresh; expiry is logged and swallowed
    pub background_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Config::default().cache_policy()
    }
}
