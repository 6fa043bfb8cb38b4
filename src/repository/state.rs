//! Repository view state published to observers.

use std::sync::Arc;

use crate::error::SyncError;

// == Phase ==
/// Coarse lifecycle phase derived from a [`RepositoryState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Loading,
    Populated,
    BackgroundRefreshing,
}

// == Repository State ==
/// Snapshot of one repository's in-memory view.
///
/// `items` is never mutated in place: every change installs a new `Arc`,
/// so observers can detect changes by pointer identity.
#[derive(Debug, Clone)]
pub struct RepositoryState<T> {
    /// The authoritative client-side collection, unique by id
    pub items: Arc<Vec<T>>,
    /// A foreground load is in flight
    pub is_loading: bool,
    /// A background revalidation is in flight
    pub is_background_refreshing: bool,
    /// Last surfaced failure; cleared by the next success
    pub last_error: Option<SyncError>,
    /// Owner the collection was loaded for; None until hydrated
    pub owner_id: Option<String>,
    /// Bumped on every change to `items`
    pub version: u64,
}

impl<T> Default for RepositoryState<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            is_loading: false,
            is_background_refreshing: false,
            last_error: None,
            owner_id: None,
            version: 0,
        }
    }
}

impl<T> RepositoryState<T> {
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.items.is_empty() {
            Phase::Empty
        } else if self.is_background_refreshing {
            Phase::BackgroundRefreshing
        } else {
            Phase::Populated
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True once the collection was loaded for `owner_id`.
    pub fn is_hydrated_for(&self, owner_id: &str) -> bool {
        self.owner_id.as_deref() == Some(owner_id)
    }

    /// Installs a new collection and bumps the version.
    pub fn replace_items(&mut self, items: Vec<T>) {
        self.items = Arc::new(items);
        self.version += 1;
    }

    /// Back to `Empty`. The version keeps increasing so in-flight work
    /// started before the reset can tell it is stale.
    pub fn reset(&mut self) {
        self.items = Arc::new(Vec::new());
        self.is_loading = false;
        self.is_background_refreshing = false;
        self.last_error = None;
        self.owner_id = None;
        self.version += 1;
    }
}

// == Refresh Outcome ==
/// Result of one background revalidation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No session, nothing loaded yet, or another check was in flight
    Skipped,
    /// The cached snapshot is still within its TTL; no network call
    Fresh,
    /// The server returned the collection already held
    Unchanged,
    /// The server returned a different collection, now installed
    Updated,
    /// A foreground change landed while the call was in flight
    Discarded,
    /// The call failed; the failure was logged and swallowed
    Failed,
}
