//! Membership reconciliation: diff an authoritative directory member list
//! against the local membership set of one group.
//!
//! The reconciler is pure. It produces a [`ReconciliationPlan`] which the
//! storage layer writes back inside the same transaction the local set was
//! read in. Every record confirmed by the directory is tagged with the run's
//! epoch; untagged non-admin records are swept.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use group_sync_sdk::{
    Group, GroupSyncCounts, LocalUser, Membership, MembershipId, MembershipStatus, SyncEpoch,
    UserId,
};
use uuid::Uuid;

use super::error::DomainError;
use super::status::{TransitionOrigin, check_transition};

/// Locally registered users indexed by external id.
#[derive(Debug, Default, Clone)]
pub struct KnownUsers {
    by_external_id: HashMap<String, LocalUser>,
}

impl KnownUsers {
    #[must_use]
    pub fn new(users: impl IntoIterator<Item = LocalUser>) -> Self {
        let by_external_id = users
            .into_iter()
            .filter(|u| !u.external_id.is_empty())
            .map(|u| (u.external_id.clone(), u))
            .collect();
        Self { by_external_id }
    }

    #[must_use]
    pub fn get(&self, external_id: &str) -> Option<&LocalUser> {
        self.by_external_id.get(external_id)
    }
}

/// A planned write for one membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Create(Membership),
    Update(Membership),
}

impl Upsert {
    #[must_use]
    pub fn membership(&self) -> &Membership {
        match self {
            Self::Create(m) | Self::Update(m) => m,
        }
    }
}

/// A record the reconciler refused to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordConflict {
    /// The directory lists `external_id`, whose local user already holds a
    /// membership keyed by internal user id only.
    Identity {
        external_id: String,
        user_id: UserId,
        membership_id: MembershipId,
    },
    /// A local record with neither external id nor user id.
    MissingIdentity { membership_id: MembershipId },
}

impl RecordConflict {
    #[must_use]
    pub fn to_error(&self) -> DomainError {
        match self {
            Self::Identity {
                external_id,
                user_id,
                membership_id,
            } => DomainError::validation(
                "external_id",
                format!(
                    "{external_id} belongs to user {user_id}, already a member through record {membership_id} without an external id"
                ),
            ),
            Self::MissingIdentity { membership_id } => DomainError::validation(
                "identity",
                format!("membership {membership_id} has neither external id nor user id"),
            ),
        }
    }
}

/// Outcome of reconciling one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub epoch: SyncEpoch,
    /// New records and records whose status or profile changed; all carry
    /// the epoch tag.
    pub upserts: Vec<Upsert>,
    /// Seen records that only need the epoch tag refreshed.
    pub confirmed: Vec<MembershipId>,
    /// Non-admin records absent from the directory.
    pub stale_to_remove: Vec<Membership>,
    /// Admins absent from the directory; kept, reported as discrepancies.
    pub retained_admins: Vec<Membership>,
    pub conflicts: Vec<RecordConflict>,
}

impl ReconciliationPlan {
    #[must_use]
    pub fn counts(&self) -> GroupSyncCounts {
        let created = self
            .upserts
            .iter()
            .filter(|u| matches!(u, Upsert::Create(_)))
            .count();
        GroupSyncCounts {
            created,
            updated: self.upserts.len() - created,
            confirmed: self.confirmed.len(),
            removed: self.stale_to_remove.len(),
            retained_admins: self.retained_admins.len(),
            conflicts: self.conflicts.len(),
            ..GroupSyncCounts::default()
        }
    }

    /// True when nothing besides epoch tags would be written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.stale_to_remove.is_empty()
    }
}

/// One reconciliation pass. The epoch is shared by every group reconciled
/// in the same run.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    epoch: SyncEpoch,
    now: DateTime<Utc>,
}

impl Reconciler {
    #[must_use]
    pub fn new(epoch: SyncEpoch, now: DateTime<Utc>) -> Self {
        Self { epoch, now }
    }

    #[must_use]
    pub fn epoch(&self) -> SyncEpoch {
        self.epoch
    }

    #[must_use]
    pub fn reconcile(
        &self,
        group: &Group,
        authoritative: &[String],
        local: &[Membership],
        known: &KnownUsers,
    ) -> ReconciliationPlan {
        let mut plan = ReconciliationPlan {
            epoch: self.epoch,
            ..ReconciliationPlan::default()
        };

        let mut by_external_id: HashMap<&str, &Membership> = HashMap::new();
        let mut by_user_id: HashMap<UserId, &Membership> = HashMap::new();
        for m in local {
            if m.external_id.is_empty() {
                if let Some(user_id) = m.user_id {
                    by_user_id.entry(user_id).or_insert(m);
                }
            } else {
                by_external_id.entry(m.external_id.as_str()).or_insert(m);
            }
        }

        let mut seen: HashSet<MembershipId> = HashSet::new();
        let mut processed: HashSet<&str> = HashSet::new();

        for external_id in authoritative {
            let external_id = external_id.as_str();
            if external_id.is_empty() || !processed.insert(external_id) {
                continue;
            }

            if let Some(existing) = by_external_id.get(external_id) {
                seen.insert(existing.id);
                self.confirm(&mut plan, existing, known.get(external_id));
                continue;
            }

            let known_user = known.get(external_id);
            if let Some((user, conflicting)) = known_user
                .and_then(|user| by_user_id.get(&user.id).map(|m| (user, *m)))
            {
                seen.insert(conflicting.id);
                let conflict = RecordConflict::Identity {
                    external_id: external_id.to_owned(),
                    user_id: user.id,
                    membership_id: conflicting.id,
                };
                tracing::warn!(
                    group_id = %group.id,
                    external_id,
                    membership_id = %conflicting.id,
                    error = %conflict.to_error(),
                    "identity conflict, record left untouched"
                );
                plan.conflicts.push(conflict);
                continue;
            }

            plan.upserts
                .push(Upsert::Create(self.new_member(group, external_id, known_user)));
        }

        for m in local {
            if seen.contains(&m.id) {
                continue;
            }
            if m.identity().is_none() {
                let conflict = RecordConflict::MissingIdentity { membership_id: m.id };
                tracing::warn!(group_id = %group.id, error = %conflict.to_error(), "malformed membership skipped");
                plan.conflicts.push(conflict);
            } else if m.status.is_admin() {
                tracing::warn!(
                    group_id = %group.id,
                    membership_id = %m.id,
                    external_id = %m.external_id,
                    "admin is absent from the directory, retained"
                );
                let mut admin = m.clone();
                if refresh_from_known(&mut admin, known.get(&m.external_id)) {
                    admin.updated_at = Some(self.now);
                    plan.upserts.push(Upsert::Update(admin.clone()));
                }
                plan.retained_admins.push(admin);
            } else if check_transition(Some(m.status), None, TransitionOrigin::Reconciliation)
                .is_ok()
            {
                plan.stale_to_remove.push(m.clone());
            }
        }

        plan
    }

    fn confirm(
        &self,
        plan: &mut ReconciliationPlan,
        existing: &Membership,
        known_user: Option<&LocalUser>,
    ) {
        let mut next = existing.clone();
        let mut changed = false;

        if matches!(
            existing.status,
            MembershipStatus::Pending | MembershipStatus::Rejected
        ) && check_transition(
            Some(existing.status),
            Some(MembershipStatus::Member),
            TransitionOrigin::Reconciliation,
        )
        .is_ok()
        {
            next.status = MembershipStatus::Member;
            next.reject_reason = None;
            changed = true;
        }
        changed |= if next.status.is_admin() {
            refresh_from_known(&mut next, known_user)
        } else {
            fill_from_known(&mut next, known_user)
        };

        next.sync_epoch = Some(self.epoch);
        if changed {
            next.updated_at = Some(self.now);
            plan.upserts.push(Upsert::Update(next));
        } else {
            plan.confirmed.push(existing.id);
        }
    }

    fn new_member(
        &self,
        group: &Group,
        external_id: &str,
        known_user: Option<&LocalUser>,
    ) -> Membership {
        let mut membership = Membership {
            id: Uuid::new_v4(),
            tenant_id: group.tenant_id,
            group_id: group.id,
            external_id: external_id.to_owned(),
            user_id: None,
            name: String::new(),
            email: String::new(),
            status: MembershipStatus::Member,
            reject_reason: None,
            sync_epoch: Some(self.epoch),
            created_at: self.now,
            updated_at: None,
        };
        fill_from_known(&mut membership, known_user);
        membership
    }
}

/// Copy user id, name and email from the local user into empty fields.
/// Returns whether anything changed.
pub fn fill_from_known(membership: &mut Membership, known_user: Option<&LocalUser>) -> bool {
    let Some(user) = known_user else {
        return false;
    };
    let mut changed = false;
    if membership.user_id.is_none() {
        membership.user_id = Some(user.id);
        changed = true;
    }
    if membership.name.is_empty() && !user.name.is_empty() {
        membership.name.clone_from(&user.name);
        changed = true;
    }
    if membership.email.is_empty() && !user.email.is_empty() {
        membership.email.clone_from(&user.email);
        changed = true;
    }
    changed
}

/// Replace user id, name and email with the local user's non-empty values
/// where they differ. Used for admins, whose local account is authoritative.
/// Returns whether anything changed.
pub fn refresh_from_known(membership: &mut Membership, known_user: Option<&LocalUser>) -> bool {
    let Some(user) = known_user else {
        return false;
    };
    let mut changed = false;
    if membership.user_id != Some(user.id) {
        membership.user_id = Some(user.id);
        changed = true;
    }
    if !user.name.is_empty() && membership.name != user.name {
        membership.name.clone_from(&user.name);
        changed = true;
    }
    if !user.email.is_empty() && membership.email != user.email {
        membership.email.clone_from(&user.email);
        changed = true;
    }
    changed
}
