//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Error Kind ==
/// Coarse classification of a [`SyncError`], used by UI code to pick a
/// presentation without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Network,
    Validation,
    NotFound,
    CacheSerialization,
}

// == Sync Error Enum ==
/// Unified error type for repositories, remote collaborators and the cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Missing or rejected credentials; usually a logout in progress
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport failure or unexpected server response
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within its deadline, when known
    #[error("Request timed out{}", deadline_suffix(.0))]
    Timeout(Option<Duration>),

    /// The server refused the input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The entity does not exist server-side
    #[error("Not found: {0}")]
    NotFound(String),

    /// A cached snapshot could not be encoded or decoded
    #[error("Cache serialization failed: {0}")]
    CacheSerialization(String),

    /// The cache refused an entry because of its size
    #[error("Cache capacity exceeded: {0}")]
    CacheCapacity(String),
}

impl SyncError {
    // == Kind ==
    /// Maps the error onto the user-facing taxonomy.
    ///
    /// Timeouts are network-class errors; capacity refusals count as
    /// serialization failures because both mean "not cached".
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Authentication(_) => ErrorKind::Authentication,
            SyncError::Network(_) | SyncError::Timeout(_) => ErrorKind::Network,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::CacheSerialization(_) | SyncError::CacheCapacity(_) => {
                ErrorKind::CacheSerialization
            }
        }
    }

    /// True for errors that mean "no authenticated user right now".
    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// True when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::CacheSerialization(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured deadline
            SyncError::Timeout(None)
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

fn deadline_suffix(deadline: &Option<Duration>) -> String {
    match deadline {
        Some(limit) => format!(" after {:?}", limit),
        None => " (deadline unknown)".to_string(),
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;
