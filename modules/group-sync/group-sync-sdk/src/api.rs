//! Public API trait for the group-sync module.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::GroupSyncError;
use crate::models::{
    ApprovalDecision, GroupId, GroupSyncCounts, LocalUser, ManagedGroupConfig, MemberListView,
    Membership, MembershipId, MembershipStatus, SyncConfig, SyncSummary, TenantId, Viewer,
};

/// Public API of the group-sync module.
///
/// Triggered by a scheduler or an administrator:
///
/// ```ignore
/// let summary = client.run_tenant_sync(tenant_id, true).await?;
/// if summary.is_partial() {
///     for report in summary.failed_groups() {
///         tracing::warn!(group_id = %report.group_id, "group failed to synchronize");
///     }
/// }
/// ```
#[async_trait]
pub trait GroupSyncClient: Send + Sync {
    /// Synchronize every directory-backed group of a tenant.
    ///
    /// Per-group failures are reported inside the [`SyncSummary`]; they never
    /// fail the call.
    ///
    /// # Errors
    ///
    /// - `LeaseContention` if another tenant run holds a live lease
    /// - `AlreadySynced` if `require_threshold` is set and the last run
    ///   finished within the tenant threshold
    /// - `Storage` if the lease could not be written
    async fn run_tenant_sync(
        &self,
        tenant_id: TenantId,
        require_threshold: bool,
    ) -> Result<SyncSummary, GroupSyncError>;

    /// Synchronize a single directory-backed group on demand.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` (group is not directory-backed),
    /// `LeaseContention`, `DirectoryUnavailable` or `Storage`.
    async fn sync_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
    ) -> Result<GroupSyncCounts, GroupSyncError>;

    /// Local join request. Creates a `member` when the group allows automatic
    /// join, `pending` otherwise; a rejected user asking again becomes `member`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` or `Storage`.
    async fn join_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        user: &LocalUser,
    ) -> Result<Membership, GroupSyncError>;

    /// Approve or reject a `pending` membership.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` (not pending, or rejection without reason)
    /// or `Storage`.
    async fn apply_membership_approval(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        decision: ApprovalDecision,
    ) -> Result<Membership, GroupSyncError>;

    /// Promote or demote a membership (`member` <-> `admin`).
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` (invalid transition) or `Storage`.
    async fn update_membership_status(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        status: MembershipStatus,
    ) -> Result<Membership, GroupSyncError>;

    /// Explicit administrative removal; the only way an admin is removed.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Storage`.
    async fn delete_membership(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
    ) -> Result<(), GroupSyncError>;

    /// Member list of a group as visible to `viewer`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Storage`.
    async fn list_members(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        viewer: Viewer,
    ) -> Result<MemberListView, GroupSyncError>;

    /// Effective synchronization settings of a tenant.
    ///
    /// # Errors
    ///
    /// `Storage`.
    async fn get_sync_config(&self, tenant_id: TenantId) -> Result<SyncConfig, GroupSyncError>;

    /// Store per-tenant settings; `0` selects the module default.
    ///
    /// # Errors
    ///
    /// `Validation` (negative or above one year) or `Storage`.
    async fn update_sync_config(&self, config: SyncConfig) -> Result<(), GroupSyncError>;

    /// # Errors
    ///
    /// `Storage`.
    async fn list_managed_group_configs(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ManagedGroupConfig>, GroupSyncError>;

    /// # Errors
    ///
    /// `Validation` (no stems) or `Storage`.
    async fn create_managed_group_config(
        &self,
        tenant_id: TenantId,
        stems: Vec<String>,
        admin_external_ids: Vec<String>,
    ) -> Result<ManagedGroupConfig, GroupSyncError>;

    /// # Errors
    ///
    /// `NotFound`, `Validation` or `Storage`.
    async fn update_managed_group_config(
        &self,
        config: ManagedGroupConfig,
    ) -> Result<ManagedGroupConfig, GroupSyncError>;

    /// # Errors
    ///
    /// `NotFound` or `Storage`.
    async fn delete_managed_group_config(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<(), GroupSyncError>;
}
