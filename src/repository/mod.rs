//! Repository Module
//!
//! Per-resource repositories holding the in-memory view of a collection,
//! plus the object-safe seam the scheduler and lifecycle binder drive.

mod entity;
mod repo;
mod state;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::cache::SharedCache;
use crate::config::CachePolicy;
use crate::invalidation::InvalidationCoordinator;
use crate::remote::DynPetApi;
use crate::session::Session;

pub use entity::{AttachImage, Entity};
pub use repo::Repository;
pub use state::{Phase, RefreshOutcome, RepositoryState};

/// Repository for the signed-in owner's pets.
pub type PetRepository = Repository<DynPetApi>;

// == Repository Context ==
/// Dependencies shared by every repository of a session.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub cache: SharedCache,
    pub session: Session,
    pub invalidation: InvalidationCoordinator,
    pub policy: CachePolicy,
}

impl RepositoryContext {
    /// Context using the standard cascade rules.
    pub fn new(cache: SharedCache, session: Session, policy: CachePolicy) -> Self {
        Self {
            invalidation: InvalidationCoordinator::standard(cache.clone()),
            cache,
            session,
            policy,
        }
    }
}

// == Managed Repository ==
/// Operations the refresh scheduler and lifecycle binder need from any
/// repository, regardless of its entity type.
#[async_trait]
pub trait ManagedRepository: Send + Sync {
    fn name(&self) -> &str;

    /// Drops the in-memory view to `Empty`.
    fn reset(&self);

    fn is_empty(&self) -> bool;

    /// Starts a load without waiting for it.
    fn load(&self, force_refresh: bool) -> JoinHandle<()>;

    /// Runs one background staleness check.
    async fn background_refresh(&self) -> RefreshOutcome;
}

