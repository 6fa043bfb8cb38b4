//! Lifecycle Binder
//!
//! Turns session events into repository resets and reloads. Events arrive
//! over an mpsc channel or through [`LifecycleBinder::handle`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::repository::ManagedRepository;
use crate::session::Session;

/// Session transitions the binder reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    LoggedIn { owner_id: String, token: String },
    LoggedOut,
    /// The app returned to the foreground
    Foreground,
}

/// Keeps the repositories in step with the session.
#[derive(Clone)]
pub struct LifecycleBinder {
    session: Session,
    cache: SharedCache,
    repositories: Vec<Arc<dyn ManagedRepository>>,
}

impl LifecycleBinder {
    pub fn new(
        session: Session,
        cache: SharedCache,
        repositories: Vec<Arc<dyn ManagedRepository>>,
    ) -> Self {
        Self {
            session,
            cache,
            repositories,
        }
    }

    /// Applies one event. Returns the handles of any loads it started.
    pub fn handle(&self, event: LifecycleEvent) -> Vec<JoinHandle<()>> {
        match event {
            LifecycleEvent::LoggedIn { owner_id, token } => self.on_logged_in(owner_id, token),
            LifecycleEvent::LoggedOut => {
                self.on_logged_out();
                Vec::new()
            }
            LifecycleEvent::Foreground => self.on_foreground(),
        }
    }

    /// Starts the session and triggers a cache-first load everywhere.
    ///
    /// Switching directly to another owner resets the views first; the
    /// previous owner's cache entries are kept for when they return.
    pub fn on_logged_in(&self, owner_id: String, token: String) -> Vec<JoinHandle<()>> {
        if let Some(previous) = self.session.owner_id() {
            if previous != owner_id {
                debug!("Owner switched from {} to {}, resetting views", previous, owner_id);
                self.reset_all();
            }
        }

        info!("Owner {} logged in", owner_id);
        self.session.login(owner_id, token);

        self.repositories
            .iter()
            .map(|repo| repo.load(false))
            .collect()
    }

    /// Ends the session, empties every view and drops the owner's cache.
    ///
    /// The session is closed first so no in-flight response can commit
    /// once the views are reset.
    pub fn on_logged_out(&self) {
        let previous = self.session.logout();
        self.reset_all();

        match previous {
            Some(owner_id) => {
                let removed = self.cache.clear_scope(&owner_id);
                info!("Owner {} logged out, dropped {} cache entries", owner_id, removed);
            }
            None => debug!("Logout without an active owner"),
        }
    }

    /// Reloads the repositories whose view was emptied while backgrounded.
    pub fn on_foreground(&self) -> Vec<JoinHandle<()>> {
        if self.session.owner_id().is_none() {
            debug!("Foreground without an owner, nothing to reload");
            return Vec::new();
        }

        self.repositories
            .iter()
            .filter(|repo| repo.is_empty())
            .map(|repo| {
                debug!("{}: empty on foreground, reloading", repo.name());
                repo.load(false)
            })
            .collect()
    }

    fn reset_all(&self) {
        for repo in &self.repositories {
            repo.reset();
        }
    }

    /// Processes events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            debug!("Lifecycle event: {:?}", event);
            self.handle(event);
        }
        debug!("Lifecycle channel closed");
    }

    /// Spawns [`run`](Self::run) on the runtime.
    pub fn spawn(self, events: mpsc::Receiver<LifecycleEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
