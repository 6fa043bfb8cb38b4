//! Refresh Scheduler
//!
//! Periodically asks every registered repository to revalidate its
//! collection in the background.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::repository::{ManagedRepository, RefreshOutcome};

/// Runs one background check on each repository, in order.
///
/// Returns the outcome per repository name.
pub async fn refresh_all(
    repositories: &[Arc<dyn ManagedRepository>],
) -> Vec<(String, RefreshOutcome)> {
    let mut outcomes = Vec::with_capacity(repositories.len());
    for repo in repositories {
        let outcome = repo.background_refresh().await;
        debug!("Scheduled refresh of {}: {:?}", repo.name(), outcome);
        outcomes.push((repo.name().to_string(), outcome));
    }
    outcomes
}

/// Spawns the periodic background refresh loop.
///
/// The first pass runs one `interval` after spawning. Failures inside a
/// pass are handled by the repositories and never stop the loop.
pub fn spawn_refresh_task(
    repositories: Vec<Arc<dyn ManagedRepository>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting refresh scheduler for {} repositories every {:?}",
            repositories.len(),
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let outcomes = refresh_all(&repositories).await;
            let updated = outcomes
                .iter()
                .filter(|(_, outcome)| *outcome == RefreshOutcome::Updated)
                .count();
            if updated > 0 {
                info!("Refresh pass: {} repositories updated", updated);
            }
        }
    })
}
