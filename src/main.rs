//! PetSync - client-side data synchronization for pet records
//!
//! Runs the sync layer headless: signs in, keeps the pet collection fresh
//! in the background and logs every state change until shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petsync::remote::{
    DynPetApi, HttpImageStore, HttpPetApi, ImageStore, InMemoryImageStore, InMemoryPetApi,
};
use petsync::repository::{ManagedRepository, PetRepository};
use petsync::{
    spawn_cleanup_task, spawn_refresh_task, Config, LifecycleBinder, LifecycleEvent,
    RepositoryContext, Session, SharedCache,
};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, session, backend and pet repository
/// 4. Start lifecycle binder, refresh scheduler and expiry sweep
/// 5. Sign in from `PETSYNC_OWNER_ID` / `PETSYNC_TOKEN` if set
/// 6. On SIGINT/SIGTERM, log out and stop background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PetSync");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, collection_ttl={}s, refresh_interval={}s, cleanup_interval={}s",
        config.max_entries, config.collection_ttl, config.refresh_interval, config.cleanup_interval
    );

    let cache = SharedCache::new(config.max_entries);
    let session = Session::new();

    let (api, images): (Arc<DynPetApi>, Arc<dyn ImageStore>) = match &config.api_base_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout))
                .build()?;
            info!("Using HTTP backend at {}", url);
            let api: Arc<DynPetApi> =
                Arc::new(HttpPetApi::with_client(client.clone(), url.as_str(), session.clone()));
            let images: Arc<dyn ImageStore> =
                Arc::new(HttpImageStore::with_client(client, url.as_str(), session.clone()));
            (api, images)
        }
        None => {
            warn!("PETSYNC_API_URL not set, using in-memory backend");
            let api: Arc<DynPetApi> = Arc::new(InMemoryPetApi::new());
            let images: Arc<dyn ImageStore> = Arc::new(InMemoryImageStore::new());
            (api, images)
        }
    };

    let ctx = RepositoryContext::new(cache.clone(), session.clone(), config.cache_policy());
    let pets = PetRepository::new("pets", api, ctx).with_images(images);
    let watcher = spawn_state_logger(&pets);

    let repositories: Vec<Arc<dyn ManagedRepository>> = vec![Arc::new(pets.clone())];
    let binder = LifecycleBinder::new(session.clone(), cache.clone(), repositories.clone());
    let (events, receiver) = mpsc::channel(16);
    let binder_handle = binder.spawn(receiver);

    let refresh_handle = spawn_refresh_task(
        repositories,
        Duration::from_secs(config.refresh_interval),
    );
    let cleanup_handle =
        spawn_cleanup_task(cache.clone(), Duration::from_secs(config.cleanup_interval));
    info!("Background tasks started");

    match (
        std::env::var("PETSYNC_OWNER_ID"),
        std::env::var("PETSYNC_TOKEN"),
    ) {
        (Ok(owner_id), Ok(token)) => {
            events
                .send(LifecycleEvent::LoggedIn { owner_id, token })
                .await?;
        }
        _ => info!("No PETSYNC_OWNER_ID/PETSYNC_TOKEN, waiting signed out"),
    }

    shutdown_signal().await;

    events.send(LifecycleEvent::LoggedOut).await?;
    drop(events);
    binder_handle.await?;

    refresh_handle.abort();
    cleanup_handle.abort();
    watcher.abort();
    warn!("Background tasks aborted");

    let stats = cache.stats();
    info!(
        "Shutdown complete: hits={}, misses={}, evictions={}",
        stats.hits, stats.misses, stats.evictions
    );
    Ok(())
}

/// Logs every state change of the pet repository.
fn spawn_state_logger(pets: &PetRepository) -> JoinHandle<()> {
    let mut receiver = pets.subscribe();
    tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let state = receiver.borrow_and_update().clone();
            info!(
                "pets: phase={:?} items={} version={}",
                state.phase(),
                state.items.len(),
                state.version
            );
            if let Some(error) = &state.last_error {
                warn!("pets: last error: {}", error);
            }
        }
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
