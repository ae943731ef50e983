//! Conversions between storage rows and domain models.

use group_sync_sdk::{
    Group, LocalUser, ManagedGroupConfig, Membership, MembershipStatus, SyncConfig, SyncLease,
};
use sea_orm::ActiveValue::Set;

use super::entity::{group, managed_group_config, membership, sync_config, sync_lease, user};
use crate::domain::error::DomainError;

impl From<group::Model> for Group {
    fn from(m: group::Model) -> Self {
        Self {
            id: m.id,
            tenant_id: m.tenant_id,
            title: m.title,
            directory_key: m.directory_key,
            embedded_members: m.embedded_members,
            can_join_automatically: m.can_join_automatically,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<&Group> for group::ActiveModel {
    fn from(g: &Group) -> Self {
        Self {
            id: Set(g.id),
            tenant_id: Set(g.tenant_id),
            title: Set(g.title.clone()),
            directory_key: Set(g.directory_key.clone()),
            embedded_members: Set(g.embedded_members),
            can_join_automatically: Set(g.can_join_automatically),
            created_at: Set(g.created_at),
            updated_at: Set(g.updated_at),
        }
    }
}

impl From<membership::Status> for MembershipStatus {
    fn from(s: membership::Status) -> Self {
        match s {
            membership::Status::Pending => Self::Pending,
            membership::Status::Member => Self::Member,
            membership::Status::Admin => Self::Admin,
            membership::Status::Rejected => Self::Rejected,
        }
    }
}

impl From<MembershipStatus> for membership::Status {
    fn from(s: MembershipStatus) -> Self {
        match s {
            MembershipStatus::Pending => Self::Pending,
            MembershipStatus::Member => Self::Member,
            MembershipStatus::Admin => Self::Admin,
            MembershipStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<membership::Model> for Membership {
    fn from(m: membership::Model) -> Self {
        Self {
            id: m.id,
            tenant_id: m.tenant_id,
            group_id: m.group_id,
            external_id: m.external_id,
            user_id: m.user_id,
            name: m.name,
            email: m.email,
            status: m.status.into(),
            reject_reason: m.reject_reason,
            sync_epoch: m.sync_epoch,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<&Membership> for membership::ActiveModel {
    fn from(m: &Membership) -> Self {
        Self {
            id: Set(m.id),
            tenant_id: Set(m.tenant_id),
            group_id: Set(m.group_id),
            external_id: Set(m.external_id.clone()),
            user_id: Set(m.user_id),
            name: Set(m.name.clone()),
            email: Set(m.email.clone()),
            status: Set(m.status.into()),
            reject_reason: Set(m.reject_reason.clone()),
            sync_epoch: Set(m.sync_epoch),
            created_at: Set(m.created_at),
            updated_at: Set(m.updated_at),
        }
    }
}

impl From<user::Model> for LocalUser {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            tenant_id: m.tenant_id,
            external_id: m.external_id,
            name: m.name,
            email: m.email,
        }
    }
}

impl From<&LocalUser> for user::ActiveModel {
    fn from(u: &LocalUser) -> Self {
        Self {
            id: Set(u.id),
            tenant_id: Set(u.tenant_id),
            external_id: Set(u.external_id.clone()),
            name: Set(u.name.clone()),
            email: Set(u.email.clone()),
        }
    }
}

impl From<sync_lease::Model> for SyncLease {
    fn from(m: sync_lease::Model) -> Self {
        Self {
            scope_key: m.scope_key,
            holder_id: m.holder_id,
            started_at: m.started_at,
            ended_at: m.ended_at,
            timeout_minutes: m.timeout_minutes,
        }
    }
}

impl From<&SyncLease> for sync_lease::ActiveModel {
    fn from(l: &SyncLease) -> Self {
        Self {
            scope_key: Set(l.scope_key.clone()),
            holder_id: Set(l.holder_id),
            started_at: Set(l.started_at),
            ended_at: Set(l.ended_at),
            timeout_minutes: Set(l.timeout_minutes),
        }
    }
}

impl From<sync_config::Model> for SyncConfig {
    fn from(m: sync_config::Model) -> Self {
        Self {
            tenant_id: m.tenant_id,
            timeout_minutes: m.timeout_minutes,
            group_timeout_minutes: m.group_timeout_minutes,
            time_threshold_minutes: m.time_threshold_minutes,
        }
    }
}

impl From<&SyncConfig> for sync_config::ActiveModel {
    fn from(c: &SyncConfig) -> Self {
        Self {
            tenant_id: Set(c.tenant_id),
            timeout_minutes: Set(c.timeout_minutes),
            group_timeout_minutes: Set(c.group_timeout_minutes),
            time_threshold_minutes: Set(c.time_threshold_minutes),
        }
    }
}

fn string_list(field: &str, value: serde_json::Value) -> Result<Vec<String>, DomainError> {
    serde_json::from_value(value)
        .map_err(|e| DomainError::storage(format!("malformed {field} column: {e}")))
}

impl TryFrom<managed_group_config::Model> for ManagedGroupConfig {
    type Error = DomainError;

    fn try_from(m: managed_group_config::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            tenant_id: m.tenant_id,
            stems: string_list("stems", m.stems)?,
            admin_external_ids: string_list("admin_external_ids", m.admin_external_ids)?,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl From<&ManagedGroupConfig> for managed_group_config::ActiveModel {
    fn from(c: &ManagedGroupConfig) -> Self {
        Self {
            id: Set(c.id),
            tenant_id: Set(c.tenant_id),
            stems: Set(serde_json::Value::from(c.stems.clone())),
            admin_external_ids: Set(serde_json::Value::from(c.admin_external_ids.clone())),
            created_at: Set(c.created_at),
            updated_at: Set(c.updated_at),
        }
    }
}
