use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_sync_sdk::{
    Group, GroupId, LocalUser, ManagedGroupConfig, Membership, MembershipId, SyncConfig, SyncLease,
    TenantId, UserId,
};
use uuid::Uuid;

use super::error::DomainError;
use super::reconcile::ReconciliationPlan;

/// Builds a plan from the memberships read inside the reconciliation
/// transaction.
pub type PlanFn = Box<dyn FnOnce(&[Membership]) -> ReconciliationPlan + Send>;

/// Persistence for lease rows. Writes are compare-and-swap: `false` means a
/// concurrent writer changed the row first.
#[async_trait]
pub trait LeaseRepository: Send + Sync {
    async fn find(&self, scope_key: &str) -> Result<Option<SyncLease>, DomainError>;

    /// Insert the row unless one already exists for the scope.
    async fn insert_if_absent(&self, lease: &SyncLease) -> Result<bool, DomainError>;

    /// Overwrite the row only if it still carries `observed_holder` and the
    /// observed released/held state.
    async fn replace(
        &self,
        observed_holder: Uuid,
        observed_released: bool,
        lease: &SyncLease,
    ) -> Result<bool, DomainError>;

    /// Set `ended_at` if the row is still held by `holder_id`.
    async fn release(
        &self,
        scope_key: &str,
        holder_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find(&self, tenant_id: TenantId, id: GroupId) -> Result<Option<Group>, DomainError>;

    async fn find_by_directory_key(
        &self,
        tenant_id: TenantId,
        directory_key: &str,
    ) -> Result<Option<Group>, DomainError>;

    /// Groups with a non-empty directory key.
    async fn list_directory_backed(&self, tenant_id: TenantId) -> Result<Vec<Group>, DomainError>;

    async fn insert(&self, group: &Group) -> Result<(), DomainError>;

    async fn update(&self, group: &Group) -> Result<(), DomainError>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn list_by_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
    ) -> Result<Vec<Membership>, DomainError>;

    async fn find(
        &self,
        tenant_id: TenantId,
        id: MembershipId,
    ) -> Result<Option<Membership>, DomainError>;

    async fn find_by_external_id(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        external_id: &str,
    ) -> Result<Option<Membership>, DomainError>;

    async fn find_by_user(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<Option<Membership>, DomainError>;

    async fn insert(&self, membership: &Membership) -> Result<(), DomainError>;

    async fn update(&self, membership: &Membership) -> Result<(), DomainError>;

    /// Returns `false` if nothing was deleted.
    async fn delete(&self, tenant_id: TenantId, id: MembershipId) -> Result<bool, DomainError>;

    /// Read the group's memberships, build a plan with `plan` and write it
    /// back, all in one transaction. Nothing is written if any step fails.
    async fn reconcile_in_tx(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        plan: PlanFn,
    ) -> Result<ReconciliationPlan, DomainError>;

    /// Write enriched names and emails into fields that are still empty.
    /// Returns the number of records touched.
    async fn fill_profiles(&self, memberships: &[Membership]) -> Result<usize, DomainError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_external_ids(
        &self,
        tenant_id: TenantId,
        external_ids: &[String],
    ) -> Result<Vec<LocalUser>, DomainError>;

    async fn upsert(&self, user: &LocalUser) -> Result<(), DomainError>;
}

#[async_trait]
pub trait SyncConfigRepository: Send + Sync {
    async fn find(&self, tenant_id: TenantId) -> Result<Option<SyncConfig>, DomainError>;

    async fn upsert(&self, config: &SyncConfig) -> Result<(), DomainError>;
}

#[async_trait]
pub trait ManagedGroupConfigRepository: Send + Sync {
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<ManagedGroupConfig>, DomainError>;

    async fn find(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<ManagedGroupConfig>, DomainError>;

    async fn insert(&self, config: &ManagedGroupConfig) -> Result<(), DomainError>;

    async fn update(&self, config: &ManagedGroupConfig) -> Result<(), DomainError>;

    async fn delete(&self, tenant_id: TenantId, id: Uuid) -> Result<bool, DomainError>;
}
