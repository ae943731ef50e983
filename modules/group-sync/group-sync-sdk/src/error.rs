//! Error types for the group-sync module.

use serde::Serialize;
use thiserror::Error;

/// Errors returned by the public group-sync API.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GroupSyncError {
    /// Another run holds a non-stale lease for the scope. Back off and retry.
    #[error("another synchronization is running for {scope}")]
    LeaseContention { scope: String },

    /// The previous tenant run finished less than the configured threshold ago.
    #[error("{scope} was synchronized recently")]
    AlreadySynced { scope: String },

    /// The directory could not be reached; retried on the next scheduled run.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl GroupSyncError {
    /// Whether the failure is transient and a later run may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LeaseContention { .. } | Self::AlreadySynced { .. } | Self::DirectoryUnavailable(_)
        )
    }
}

/// Failures reported by a [`crate::DirectoryClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory request '{operation}' timed out")]
    Timeout { operation: String },

    #[error("directory transport failure: {0}")]
    Transport(String),

    #[error("invalid directory response: {0}")]
    InvalidResponse(String),
}

impl From<DirectoryError> for GroupSyncError {
    fn from(e: DirectoryError) -> Self {
        Self::DirectoryUnavailable(e.to_string())
    }
}
