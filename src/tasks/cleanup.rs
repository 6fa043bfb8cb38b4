//! Expiry Sweep Task
//!
//! Background task that periodically removes stale cache entries so the
//! store does not keep dead snapshots around until they are read.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that periodically sweeps stale cache entries.
///
/// # Arguments
/// * `cache` - Shared cache handle
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during shutdown.
pub fn spawn_cleanup_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();

            if removed > 0 {
                info!("Cache sweep: removed {} stale entries", removed);
            } else {
                debug!("Cache sweep: no stale entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, KeyKind};

    #[tokio::test]
    async fn test_cleanup_task_removes_stale_entries() {
        let cache = SharedCache::new(100);
        let short = CacheKey::entity(KeyKind::ScanHistory, "u1", "p1");
        let long = CacheKey::entity(KeyKind::ScanHistory, "u1", "p2");

        cache.set(short.clone(), &"[]", Some(Duration::from_millis(20)));
        cache.set(long.clone(), &"[]", Some(Duration::from_secs(3600)));

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.len(), 1, "stale entry should have been swept");
        assert!(cache.exists(&long));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(SharedCache::new(10), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
