use std::sync::Arc;

use async_trait::async_trait;
use group_sync_sdk::{
    ApprovalDecision, GroupId, GroupSyncClient, GroupSyncCounts, GroupSyncError, LocalUser,
    ManagedGroupConfig, MemberListView, Membership, MembershipId, MembershipStatus, SyncConfig,
    SyncSummary, TenantId, Viewer,
};
use uuid::Uuid;

use crate::domain::service::Service;

/// In-process [`GroupSyncClient`] backed by the domain service.
pub struct LocalClient {
    service: Arc<Service>,
}

impl LocalClient {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl GroupSyncClient for LocalClient {
    async fn run_tenant_sync(
        &self,
        tenant_id: TenantId,
        require_threshold: bool,
    ) -> Result<SyncSummary, GroupSyncError> {
        self.service
            .run_tenant_sync(tenant_id, require_threshold)
            .await
            .map_err(Into::into)
    }

    async fn sync_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
    ) -> Result<GroupSyncCounts, GroupSyncError> {
        self.service
            .sync_group(tenant_id, group_id)
            .await
            .map_err(Into::into)
    }

    async fn join_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        user: &LocalUser,
    ) -> Result<Membership, GroupSyncError> {
        self.service
            .join_group(tenant_id, group_id, user)
            .await
            .map_err(Into::into)
    }

    async fn apply_membership_approval(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        decision: ApprovalDecision,
    ) -> Result<Membership, GroupSyncError> {
        self.service
            .apply_membership_approval(tenant_id, membership_id, decision)
            .await
            .map_err(Into::into)
    }

    async fn update_membership_status(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        status: MembershipStatus,
    ) -> Result<Membership, GroupSyncError> {
        self.service
            .update_membership_status(tenant_id, membership_id, status)
            .await
            .map_err(Into::into)
    }

    async fn delete_membership(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
    ) -> Result<(), GroupSyncError> {
        self.service
            .delete_membership(tenant_id, membership_id)
            .await
            .map_err(Into::into)
    }

    async fn list_members(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        viewer: Viewer,
    ) -> Result<MemberListView, GroupSyncError> {
        self.service
            .list_members(tenant_id, group_id, &viewer)
            .await
            .map_err(Into::into)
    }

    async fn get_sync_config(&self, tenant_id: TenantId) -> Result<SyncConfig, GroupSyncError> {
        self.service
            .get_sync_config(tenant_id)
            .await
            .map_err(Into::into)
    }

    async fn update_sync_config(&self, config: SyncConfig) -> Result<(), GroupSyncError> {
        self.service
            .update_sync_config(&config)
            .await
            .map_err(Into::into)
    }

    async fn list_managed_group_configs(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ManagedGroupConfig>, GroupSyncError> {
        self.service
            .list_managed_group_configs(tenant_id)
            .await
            .map_err(Into::into)
    }

    async fn create_managed_group_config(
        &self,
        tenant_id: TenantId,
        stems: Vec<String>,
        admin_external_ids: Vec<String>,
    ) -> Result<ManagedGroupConfig, GroupSyncError> {
        self.service
            .create_managed_group_config(tenant_id, &stems, &admin_external_ids)
            .await
            .map_err(Into::into)
    }

    async fn update_managed_group_config(
        &self,
        config: ManagedGroupConfig,
    ) -> Result<ManagedGroupConfig, GroupSyncError> {
        self.service
            .update_managed_group_config(config)
            .await
            .map_err(Into::into)
    }

    async fn delete_managed_group_config(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<(), GroupSyncError> {
        self.service
            .delete_managed_group_config(tenant_id, id)
            .await
            .map_err(Into::into)
    }
}
