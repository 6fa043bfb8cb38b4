//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a session is live.
//!
//! # Tasks
//! - Refresh scheduler: revalidates repository collections at a fixed interval
//! - Expiry sweep: removes stale cache entries at a fixed interval

mod cleanup;
mod refresh;

pub use cleanup::spawn_cleanup_task;
pub use refresh::{refresh_all, spawn_refresh_task};
