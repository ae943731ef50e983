//! Group-sync SDK
//!
//! Contract of the group-sync module:
//! - [`GroupSyncClient`] - API exposed to schedulers and administrative triggers
//! - [`DirectoryClient`] - boundary to the authoritative external directory
//! - models and errors shared by both

pub mod api;
pub mod directory;
pub mod error;
pub mod models;

pub use api::GroupSyncClient;
pub use directory::DirectoryClient;
pub use error::{DirectoryError, GroupSyncError};
pub use models::{
    ApprovalDecision, DirectoryUser, Group, GroupId, GroupSyncCounts, GroupSyncOutcome,
    GroupSyncReport, LocalUser, ManagedGroupConfig, MemberListView, MemberSummary, Membership,
    MembershipId, MembershipIdentity, MembershipStatus, StemGroup, StemSyncFailure, SyncConfig,
    SyncEpoch, SyncLease, SyncSummary, TenantId, UserId, Viewer,
};
