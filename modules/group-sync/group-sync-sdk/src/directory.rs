//! Boundary to the external, authoritative group directory.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::models::{DirectoryUser, StemGroup};

/// Client for the authoritative group directory.
///
/// The wire protocol is owned by the implementation. Every call is a
/// blocking request/response from the caller's point of view and may fail
/// with a network-shaped [`DirectoryError`].
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Current external member identifiers of a directory group.
    ///
    /// An empty list is a valid answer (the group has no members) and is
    /// distinct from an error.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] when the directory cannot be queried.
    async fn list_members(&self, group_key: &str) -> Result<Vec<String>, DirectoryError>;

    /// Profile attributes for a batch of external identifiers.
    ///
    /// Partial results are acceptable: identifiers missing from the map carry
    /// no new information.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] when the batch request fails as a whole.
    async fn list_users(
        &self,
        external_ids: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, DirectoryError>;

    /// Groups published under a directory stem.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] when the stem cannot be listed.
    async fn list_stem_groups(&self, stem: &str) -> Result<Vec<StemGroup>, DirectoryError>;
}
