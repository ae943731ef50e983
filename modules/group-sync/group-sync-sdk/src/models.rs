//! Public models for the group-sync module.
//!
//! These are transport-agnostic data structures that define the contract
//! between the group-sync module and its consumers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GroupSyncError;

pub type TenantId = Uuid;
pub type GroupId = Uuid;
pub type MembershipId = Uuid;
pub type UserId = Uuid;

/// Identifier of a single synchronization pass, stamped on every membership
/// confirmed by that pass.
pub type SyncEpoch = Uuid;

/// Status of a membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Member,
    Admin,
    Rejected,
}

impl MembershipStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// `member` and `admin` are accepted memberships.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Member | Self::Admin)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = GroupSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "rejected" => Ok(Self::Rejected),
            other => Err(GroupSyncError::Validation(format!(
                "unknown membership status '{other}'"
            ))),
        }
    }
}

/// The key that uniquely identifies a membership inside its group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MembershipIdentity {
    External(String),
    User(UserId),
}

/// A person's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub tenant_id: TenantId,
    pub group_id: GroupId,
    /// Directory key; empty for locally created accounts.
    pub external_id: String,
    /// Internal user id; `None` until the person registers.
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: String,
    pub status: MembershipStatus,
    pub reject_reason: Option<String>,
    /// Last synchronization pass that confirmed this record.
    pub sync_epoch: Option<SyncEpoch>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Identity of the record: the external id when present, otherwise the
    /// internal user id. `None` means the record is malformed.
    #[must_use]
    pub fn identity(&self) -> Option<MembershipIdentity> {
        if !self.external_id.is_empty() {
            Some(MembershipIdentity::External(self.external_id.clone()))
        } else {
            self.user_id.map(MembershipIdentity::User)
        }
    }

    #[must_use]
    pub fn is_missing_profile(&self) -> bool {
        self.name.is_empty() || self.email.is_empty()
    }
}

/// A group owned by a tenant, optionally backed by the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub tenant_id: TenantId,
    pub title: String,
    /// Directory group key; present only for directory-backed groups.
    pub directory_key: Option<String>,
    /// Memberships are embedded in the group document rather than stored as
    /// independent rows. Affects query shape only.
    pub embedded_members: bool,
    pub can_join_automatically: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Group {
    /// The directory key, if the group is eligible for synchronization.
    #[must_use]
    pub fn sync_key(&self) -> Option<&str> {
        self.directory_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// A registered local user, the source of already-known profile data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub external_id: String,
    pub name: String,
    pub email: String,
}

/// Persisted exclusivity record for a synchronization scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLease {
    pub scope_key: String,
    /// Unique per acquisition; a takeover replaces it.
    pub holder_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// `None` while held.
    pub ended_at: Option<DateTime<Utc>>,
    pub timeout_minutes: i64,
}

/// Per-tenant synchronization settings, in minutes. `0` means "use the
/// module default"; a zero threshold therefore cannot disable the re-run
/// check, pass `require_threshold = false` for that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub tenant_id: TenantId,
    pub timeout_minutes: i64,
    pub group_timeout_minutes: i64,
    pub time_threshold_minutes: i64,
}

/// Directory stems whose groups are materialized locally, plus the admins
/// every such group receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedGroupConfig {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub stems: Vec<String>,
    pub admin_external_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile attributes returned by the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A group found under a directory stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemGroup {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub admin_external_ids: Vec<String>,
}

/// Decision taken on a pending membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject { reason: String },
}

/// Per-group counters produced by a successful synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSyncCounts {
    pub created: usize,
    pub updated: usize,
    pub confirmed: usize,
    pub removed: usize,
    pub retained_admins: usize,
    pub conflicts: usize,
    pub enriched: usize,
    pub enrichment_unchanged: usize,
    pub enrichment_failed_batches: usize,
}

impl GroupSyncCounts {
    /// Number of rows written or deleted, excluding epoch refreshes.
    #[must_use]
    pub const fn changes(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupSyncOutcome {
    Synced(GroupSyncCounts),
    /// Another run holds the group lease.
    Skipped { reason: String },
    Failed { error: GroupSyncError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSyncReport {
    pub group_id: GroupId,
    pub directory_key: String,
    pub outcome: GroupSyncOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StemSyncFailure {
    pub stem: String,
    pub error: GroupSyncError,
}

/// Result of a tenant-wide synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub tenant_id: TenantId,
    pub epoch: SyncEpoch,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stem_groups_created: usize,
    pub stem_failures: Vec<StemSyncFailure>,
    pub groups: Vec<GroupSyncReport>,
}

impl SyncSummary {
    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupSyncReport> {
        self.groups
            .iter()
            .filter(|report| matches!(report.outcome, GroupSyncOutcome::Failed { .. }))
    }

    /// True when the run completed but some groups or stems failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.stem_failures.is_empty() || self.failed_groups().next().is_some()
    }

    #[must_use]
    pub fn totals(&self) -> GroupSyncCounts {
        let mut total = GroupSyncCounts::default();
        for report in &self.groups {
            if let GroupSyncOutcome::Synced(counts) = &report.outcome {
                total.created += counts.created;
                total.updated += counts.updated;
                total.confirmed += counts.confirmed;
                total.removed += counts.removed;
                total.retained_admins += counts.retained_admins;
                total.conflicts += counts.conflicts;
                total.enriched += counts.enriched;
                total.enrichment_unchanged += counts.enrichment_unchanged;
                total.enrichment_failed_batches += counts.enrichment_failed_batches;
            }
        }
        total
    }
}

/// Who is looking at a member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(UserId),
}

/// A membership as shown to a non-admin viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub id: MembershipId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub status: MembershipStatus,
}

impl From<&Membership> for MemberSummary {
    fn from(m: &Membership) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            name: m.name.clone(),
            status: m.status,
        }
    }
}

/// Role-dependent projection of a group's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MemberListView {
    Hidden,
    /// The viewer's own pending or rejected record.
    OwnRequest { membership: Membership },
    Members { members: Vec<MemberSummary> },
    Full { memberships: Vec<Membership> },
}
