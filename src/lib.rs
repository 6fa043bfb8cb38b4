//! PetSync - client-side data synchronization for pet records
//!
//! Read-through / write-through repositories over a shared TTL cache, with
//! background revalidation, cascading invalidation and session-driven resets.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod lifecycle;
pub mod models;
pub mod remote;
pub mod repository;
pub mod session;
pub mod tasks;

pub use cache::{CacheKey, KeyKind, KeyPattern, SharedCache};
pub use config::{CachePolicy, Config};
pub use error::{ErrorKind, Result, SyncError};
pub use invalidation::{CascadeRules, InvalidationCoordinator};
pub use lifecycle::{LifecycleBinder, LifecycleEvent};
pub use repository::{PetRepository, Repository, RepositoryContext, RepositoryState};
pub use session::Session;
pub use tasks::{spawn_cleanup_task, spawn_refresh_task};
