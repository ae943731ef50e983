use group_sync_sdk::{DirectoryError, GroupSyncError};
use uuid::Uuid;

/// Why a lease acquisition was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDenial {
    /// A live, non-stale lease is held by another run.
    Held,
    /// The last completed run finished within the minimum re-run threshold.
    RecentlyCompleted,
}

/// Domain-level errors for group synchronization
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("validation failed on '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("lease denied for {scope}: {reason:?}")]
    LeaseDenied { scope: String, reason: LeaseDenial },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl From<DomainError> for GroupSyncError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation { field, message } => {
                Self::Validation(format!("{field}: {message}"))
            }
            DomainError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            DomainError::LeaseDenied {
                scope,
                reason: LeaseDenial::Held,
            } => Self::LeaseContention { scope },
            DomainError::LeaseDenied {
                scope,
                reason: LeaseDenial::RecentlyCompleted,
            } => Self::AlreadySynced { scope },
            DomainError::Directory(e) => e.into(),
            DomainError::Storage(msg) => Self::Storage(msg),
        }
    }
}
