// Central Error Type for the Sync Engine

use thiserror::Error;

/// Engine-level error type.
///
/// Clonable (string payloads only) so one failure can be recorded in the
/// statistics and propagated to the caller's handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Credential refresh timed out after {0}ms")]
    RefreshTimeout(u64),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Transient failures the queue retries; everything else is terminal.
    ///
    /// NotAuthorized is terminal here: the executor already spent its one
    /// refresh-and-retry cycle before surfacing it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Timeout(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
