use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use group_sync_sdk::{
    ApprovalDecision, DirectoryClient, Group, GroupId, GroupSyncCounts, GroupSyncOutcome,
    GroupSyncReport, LocalUser, ManagedGroupConfig, MemberListView, Membership, MembershipId,
    MembershipStatus, StemSyncFailure, SyncConfig, SyncSummary, TenantId, Viewer,
};
use tracing::Instrument;
use uuid::Uuid;

use super::clock::Clock;
use super::enrich::{DEFAULT_BATCH_SIZE, EnrichmentBatcher, EnrichmentStats};
use super::error::DomainError;
use super::lease::{LeaseCoordinator, LeasePolicy, LeaseScope, MAX_LEASE_MINUTES};
use super::reconcile::{KnownUsers, Reconciler, fill_from_known, refresh_from_known};
use super::repo::{
    GroupRepository, LeaseRepository, ManagedGroupConfigRepository, MembershipRepository,
    SyncConfigRepository, UserRepository,
};
use super::status::{TransitionOrigin, admin_promotion_path, approval_target, check_transition};
use super::visibility::project_members;

/// Module-wide defaults the service falls back to.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub sync_timeout_minutes: i64,
    pub group_sync_timeout_minutes: i64,
    pub sync_threshold_minutes: i64,
    pub enrichment_batch_size: usize,
    pub max_parallel_groups: usize,
    pub admin_external_ids: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sync_timeout_minutes: 60,
            group_sync_timeout_minutes: 60,
            sync_threshold_minutes: 60,
            enrichment_batch_size: DEFAULT_BATCH_SIZE,
            max_parallel_groups: 4,
            admin_external_ids: Vec::new(),
        }
    }
}

/// Storage the service works against.
#[derive(Clone)]
pub struct Repositories {
    pub groups: Arc<dyn GroupRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub users: Arc<dyn UserRepository>,
    pub leases: Arc<dyn LeaseRepository>,
    pub sync_configs: Arc<dyn SyncConfigRepository>,
    pub managed_configs: Arc<dyn ManagedGroupConfigRepository>,
}

pub struct Service {
    repos: Repositories,
    leases: LeaseCoordinator,
    directory: Arc<dyn DirectoryClient>,
    clock: Arc<dyn Clock>,
    batcher: EnrichmentBatcher,
    config: ServiceConfig,
}

impl Service {
    #[must_use]
    pub fn new(
        repos: Repositories,
        directory: Arc<dyn DirectoryClient>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            leases: LeaseCoordinator::new(repos.leases.clone(), clock.clone()),
            batcher: EnrichmentBatcher::new(config.enrichment_batch_size),
            repos,
            directory,
            clock,
            config,
        }
    }

    /// Synchronize every directory-backed group of a tenant under the
    /// tenant lease. Group and stem failures are collected in the summary.
    ///
    /// # Errors
    ///
    /// Lease denial, `Validation` for lease settings out of range, or a
    /// storage failure before group processing starts.
    #[tracing::instrument(name = "tenant_sync", skip(self), fields(epoch = tracing::field::Empty))]
    pub async fn run_tenant_sync(
        &self,
        tenant_id: TenantId,
        require_threshold: bool,
    ) -> Result<SyncSummary, DomainError> {
        let settings = self.get_sync_config(tenant_id).await?;
        let policy = LeasePolicy::minutes(settings.timeout_minutes)?
            .with_threshold_minutes(require_threshold.then_some(settings.time_threshold_minutes))?;
        let group_policy = LeasePolicy::minutes(settings.group_timeout_minutes)?;
        let epoch = Uuid::new_v4();
        tracing::Span::current().record("epoch", tracing::field::display(epoch));

        self.leases
            .with_lease(
                &LeaseScope::Tenant(tenant_id),
                &policy,
                self.tenant_pass(tenant_id, epoch, group_policy),
            )
            .await?
    }

    async fn tenant_pass(
        &self,
        tenant_id: TenantId,
        epoch: Uuid,
        group_policy: LeasePolicy,
    ) -> Result<SyncSummary, DomainError> {
        let started_at = self.clock.now();
        let (stem_groups_created, stem_failures) = self.sync_managed_stems(tenant_id).await?;
        let groups = self.repos.groups.list_directory_backed(tenant_id).await?;

        let reconciler = Reconciler::new(epoch, started_at);
        let reports: Vec<GroupSyncReport> = stream::iter(groups)
            .map(|group| self.group_report(group, reconciler, group_policy))
            .buffer_unordered(self.config.max_parallel_groups.max(1))
            .collect()
            .await;

        let summary = SyncSummary {
            tenant_id,
            epoch,
            started_at,
            finished_at: self.clock.now(),
            stem_groups_created,
            stem_failures,
            groups: reports,
        };
        let totals = summary.totals();
        tracing::info!(
            groups = summary.groups.len(),
            failed_groups = summary.failed_groups().count(),
            stem_failures = summary.stem_failures.len(),
            created = totals.created,
            updated = totals.updated,
            removed = totals.removed,
            enriched = totals.enriched,
            "tenant sync finished"
        );
        Ok(summary)
    }

    /// Synchronize one group on demand, with its own epoch.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` for a group without directory key, lease
    /// denial, directory or storage failures.
    pub async fn sync_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
    ) -> Result<GroupSyncCounts, DomainError> {
        let group = self.find_group(tenant_id, group_id).await?;
        if group.sync_key().is_none() {
            return Err(not_directory_backed());
        }
        let settings = self.get_sync_config(tenant_id).await?;
        let reconciler = Reconciler::new(Uuid::new_v4(), self.clock.now());
        let policy = LeasePolicy::minutes(settings.group_timeout_minutes)?;
        self.sync_group_under_lease(&group, reconciler, policy).await
    }

    async fn group_report(
        &self,
        group: Group,
        reconciler: Reconciler,
        policy: LeasePolicy,
    ) -> GroupSyncReport {
        let outcome = match self.sync_group_under_lease(&group, reconciler, policy).await {
            Ok(counts) => GroupSyncOutcome::Synced(counts),
            Err(DomainError::LeaseDenied { scope, .. }) => GroupSyncOutcome::Skipped {
                reason: format!("{scope} is held by another run"),
            },
            Err(e) => {
                tracing::error!(group_id = %group.id, error = %e, "group synchronization failed");
                GroupSyncOutcome::Failed { error: e.into() }
            }
        };
        GroupSyncReport {
            group_id: group.id,
            directory_key: group.directory_key.unwrap_or_default(),
            outcome,
        }
    }

    async fn sync_group_under_lease(
        &self,
        group: &Group,
        reconciler: Reconciler,
        policy: LeasePolicy,
    ) -> Result<GroupSyncCounts, DomainError> {
        let scope = LeaseScope::Group {
            tenant_id: group.tenant_id,
            group_id: group.id,
        };
        self.leases
            .with_lease(&scope, &policy, self.reconcile_group(group, reconciler))
            .instrument(tracing::info_span!("group_sync", group_id = %group.id))
            .await?
    }

    async fn reconcile_group(
        &self,
        group: &Group,
        reconciler: Reconciler,
    ) -> Result<GroupSyncCounts, DomainError> {
        let key = group.sync_key().ok_or_else(not_directory_backed)?;
        // A failed fetch aborts the group before anything is read or written.
        let authoritative = self.directory.list_members(key).await?;

        let known = self.known_users_for(group, &authoritative).await?;
        let group_snapshot = group.clone();
        let plan = self
            .repos
            .memberships
            .reconcile_in_tx(
                group.tenant_id,
                group.id,
                Box::new(move |local| {
                    reconciler.reconcile(&group_snapshot, &authoritative, local, &known)
                }),
            )
            .await?;
        let mut counts = plan.counts();

        // The plan is committed; enrichment problems no longer fail the group.
        match self.enrich_group(group).await {
            Ok(stats) => {
                counts.enriched = stats.enriched;
                counts.enrichment_unchanged = stats.unchanged;
                counts.enrichment_failed_batches = stats.failed_batches;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "enrichment write-back failed, blank profiles are retried next run"
                );
                counts.enrichment_failed_batches += 1;
            }
        }

        tracing::info!(
            epoch = %plan.epoch,
            created = counts.created,
            updated = counts.updated,
            confirmed = counts.confirmed,
            removed = counts.removed,
            retained_admins = counts.retained_admins,
            conflicts = counts.conflicts,
            enriched = counts.enriched,
            "group synchronized"
        );
        Ok(counts)
    }

    /// Fill blank profiles of the group's current rows from the directory.
    async fn enrich_group(&self, group: &Group) -> Result<EnrichmentStats, DomainError> {
        let current = self
            .repos
            .memberships
            .list_by_group(group.tenant_id, group.id)
            .await?;
        let enrichment = self.batcher.enrich(self.directory.as_ref(), current).await;
        let changed: Vec<Membership> = enrichment.changed_memberships().cloned().collect();
        if !changed.is_empty() {
            self.repos.memberships.fill_profiles(&changed).await?;
        }
        Ok(enrichment.stats)
    }

    /// Local users for the directory list plus the group's current admins.
    async fn known_users_for(
        &self,
        group: &Group,
        authoritative: &[String],
    ) -> Result<KnownUsers, DomainError> {
        let local = self
            .repos
            .memberships
            .list_by_group(group.tenant_id, group.id)
            .await?;
        let mut external_ids: Vec<String> = authoritative
            .iter()
            .chain(
                local
                    .iter()
                    .filter(|m| m.status.is_admin())
                    .map(|m| &m.external_id),
            )
            .filter(|id| !id.is_empty())
            .cloned()
            .collect();
        external_ids.sort_unstable();
        external_ids.dedup();

        let users = self
            .repos
            .users
            .find_by_external_ids(group.tenant_id, &external_ids)
            .await?;
        Ok(KnownUsers::new(users))
    }

    async fn sync_managed_stems(
        &self,
        tenant_id: TenantId,
    ) -> Result<(usize, Vec<StemSyncFailure>), DomainError> {
        let configs = self.repos.managed_configs.list(tenant_id).await?;
        let mut created = 0;
        let mut failures = Vec::new();
        for config in &configs {
            for stem in &config.stems {
                match self
                    .sync_stem(tenant_id, stem, &config.admin_external_ids)
                    .await
                {
                    Ok(n) => created += n,
                    Err(e) => {
                        tracing::warn!(stem = %stem, error = %e, "stem discovery failed");
                        failures.push(StemSyncFailure {
                            stem: stem.clone(),
                            error: e.into(),
                        });
                    }
                }
            }
        }
        Ok((created, failures))
    }

    /// Materialize the groups found under `stem`. Returns how many were new.
    async fn sync_stem(
        &self,
        tenant_id: TenantId,
        stem: &str,
        config_admins: &[String],
    ) -> Result<usize, DomainError> {
        let stem_groups = self.directory.list_stem_groups(stem).await?;
        let mut created = 0;

        for stem_group in stem_groups {
            let now = self.clock.now();
            let existing = self
                .repos
                .groups
                .find_by_directory_key(tenant_id, &stem_group.key)
                .await?;

            if let Some(mut group) = existing {
                if group.title != stem_group.title {
                    group.title.clone_from(&stem_group.title);
                    group.updated_at = Some(now);
                    self.repos.groups.update(&group).await?;
                }
                self.ensure_admins(&group, &stem_group.admin_external_ids)
                    .await?;
            } else {
                let group = Group {
                    id: Uuid::new_v4(),
                    tenant_id,
                    title: stem_group.title.clone(),
                    directory_key: Some(stem_group.key.clone()),
                    embedded_members: false,
                    can_join_automatically: true,
                    created_at: now,
                    updated_at: None,
                };
                self.repos.groups.insert(&group).await?;
                created += 1;
                tracing::info!(group_id = %group.id, key = %stem_group.key, "stem group created");

                let admins = merge_unique(&[
                    stem_group.admin_external_ids.as_slice(),
                    config_admins,
                    self.config.admin_external_ids.as_slice(),
                ]);
                self.ensure_admins(&group, &admins).await?;
            }
        }
        Ok(created)
    }

    /// Make every listed external id an admin of `group`, walking each
    /// record through `member` as the status machine requires.
    async fn ensure_admins(&self, group: &Group, external_ids: &[String]) -> Result<(), DomainError> {
        if external_ids.is_empty() {
            return Ok(());
        }
        let known = KnownUsers::new(
            self.repos
                .users
                .find_by_external_ids(group.tenant_id, external_ids)
                .await?,
        );

        for external_id in external_ids.iter().filter(|id| !id.is_empty()) {
            let existing = self
                .repos
                .memberships
                .find_by_external_id(group.tenant_id, group.id, external_id)
                .await?;
            let path = admin_promotion_path(existing.as_ref().map(|m| m.status))?;
            if path.is_empty() {
                continue;
            }

            let now = self.clock.now();
            if let Some(mut membership) = existing {
                membership.status = MembershipStatus::Admin;
                membership.reject_reason = None;
                membership.updated_at = Some(now);
                refresh_from_known(&mut membership, known.get(external_id));
                self.repos.memberships.update(&membership).await?;
            } else {
                let mut membership = Membership {
                    id: Uuid::new_v4(),
                    tenant_id: group.tenant_id,
                    group_id: group.id,
                    external_id: external_id.clone(),
                    user_id: None,
                    name: String::new(),
                    email: String::new(),
                    status: MembershipStatus::Admin,
                    reject_reason: None,
                    sync_epoch: None,
                    created_at: now,
                    updated_at: None,
                };
                fill_from_known(&mut membership, known.get(external_id));
                self.repos.memberships.insert(&membership).await?;
            }
            tracing::debug!(group_id = %group.id, external_id = %external_id, "admin ensured");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation` or storage failures.
    pub async fn join_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        user: &LocalUser,
    ) -> Result<Membership, DomainError> {
        if user.tenant_id != tenant_id {
            return Err(DomainError::validation(
                "tenant_id",
                "user belongs to another tenant",
            ));
        }
        let group = self.find_group(tenant_id, group_id).await?;
        let now = self.clock.now();

        if let Some(mut existing) = self.find_user_membership(&group, user).await? {
            if existing.status != MembershipStatus::Rejected {
                return Ok(existing);
            }
            check_transition(
                Some(existing.status),
                Some(MembershipStatus::Member),
                TransitionOrigin::LocalRequest,
            )?;
            existing.status = MembershipStatus::Member;
            existing.reject_reason = None;
            existing.updated_at = Some(now);
            fill_from_known(&mut existing, Some(user));
            self.repos.memberships.update(&existing).await?;
            return Ok(existing);
        }

        let status = if group.can_join_automatically {
            MembershipStatus::Member
        } else {
            MembershipStatus::Pending
        };
        check_transition(None, Some(status), TransitionOrigin::LocalRequest)?;

        let membership = Membership {
            id: Uuid::new_v4(),
            tenant_id,
            group_id,
            external_id: user.external_id.clone(),
            user_id: Some(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            status,
            reject_reason: None,
            sync_epoch: None,
            created_at: now,
            updated_at: None,
        };
        self.repos.memberships.insert(&membership).await?;
        tracing::info!(group_id = %group_id, membership_id = %membership.id, status = %status, "join request recorded");
        Ok(membership)
    }

    async fn find_user_membership(
        &self,
        group: &Group,
        user: &LocalUser,
    ) -> Result<Option<Membership>, DomainError> {
        let by_user = self
            .repos
            .memberships
            .find_by_user(group.tenant_id, group.id, user.id)
            .await?;
        if by_user.is_some() || user.external_id.is_empty() {
            return Ok(by_user);
        }
        self.repos
            .memberships
            .find_by_external_id(group.tenant_id, group.id, &user.external_id)
            .await
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation` (not pending, missing reason) or storage
    /// failures.
    pub async fn apply_membership_approval(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        decision: ApprovalDecision,
    ) -> Result<Membership, DomainError> {
        let mut membership = self.find_membership(tenant_id, membership_id).await?;
        membership.status = approval_target(membership.status, &decision)?;
        membership.reject_reason = match decision {
            ApprovalDecision::Approve => None,
            ApprovalDecision::Reject { reason } => Some(reason),
        };
        membership.updated_at = Some(self.clock.now());
        self.repos.memberships.update(&membership).await?;
        tracing::info!(membership_id = %membership_id, status = %membership.status, "approval applied");
        Ok(membership)
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation` (invalid transition) or storage failures.
    pub async fn update_membership_status(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
        status: MembershipStatus,
    ) -> Result<Membership, DomainError> {
        let mut membership = self.find_membership(tenant_id, membership_id).await?;
        check_transition(
            Some(membership.status),
            Some(status),
            TransitionOrigin::Administration,
        )?;
        if membership.status == status {
            return Ok(membership);
        }
        membership.status = status;
        membership.updated_at = Some(self.clock.now());
        self.repos.memberships.update(&membership).await?;
        Ok(membership)
    }

    /// # Errors
    ///
    /// `NotFound` or storage failures.
    pub async fn delete_membership(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
    ) -> Result<(), DomainError> {
        let membership = self.find_membership(tenant_id, membership_id).await?;
        check_transition(Some(membership.status), None, TransitionOrigin::Administration)?;
        if !self
            .repos
            .memberships
            .delete(tenant_id, membership_id)
            .await?
        {
            return Err(DomainError::not_found("membership", membership_id));
        }
        tracing::info!(membership_id = %membership_id, status = %membership.status, "membership removed");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` or storage failures.
    pub async fn list_members(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        viewer: &Viewer,
    ) -> Result<MemberListView, DomainError> {
        self.find_group(tenant_id, group_id).await?;
        let memberships = self
            .repos
            .memberships
            .list_by_group(tenant_id, group_id)
            .await?;
        Ok(project_members(viewer, &memberships))
    }

    /// Stored settings with `0` (or a missing row) replaced by module
    /// defaults.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn get_sync_config(&self, tenant_id: TenantId) -> Result<SyncConfig, DomainError> {
        let stored = self.repos.sync_configs.find(tenant_id).await?;
        let pick = |value: Option<i64>, default: i64| value.filter(|v| *v > 0).unwrap_or(default);
        Ok(SyncConfig {
            tenant_id,
            timeout_minutes: pick(
                stored.as_ref().map(|c| c.timeout_minutes),
                self.config.sync_timeout_minutes,
            ),
            group_timeout_minutes: pick(
                stored.as_ref().map(|c| c.group_timeout_minutes),
                self.config.group_sync_timeout_minutes,
            ),
            time_threshold_minutes: pick(
                stored.as_ref().map(|c| c.time_threshold_minutes),
                self.config.sync_threshold_minutes,
            ),
        })
    }

    /// Store per-tenant settings. A value of `0` means "use the module
    /// default" and is resolved by [`Self::get_sync_config`].
    ///
    /// # Errors
    ///
    /// `Validation` for negative values or values above
    /// [`MAX_LEASE_MINUTES`], or storage failures.
    pub async fn update_sync_config(&self, config: &SyncConfig) -> Result<(), DomainError> {
        for (field, value) in [
            ("timeout_minutes", config.timeout_minutes),
            ("group_timeout_minutes", config.group_timeout_minutes),
            ("time_threshold_minutes", config.time_threshold_minutes),
        ] {
            if value < 0 {
                return Err(DomainError::validation(field, "must not be negative"));
            }
            if value > MAX_LEASE_MINUTES {
                return Err(DomainError::validation(
                    field,
                    format!("must not exceed {MAX_LEASE_MINUTES} minutes"),
                ));
            }
        }
        self.repos.sync_configs.upsert(config).await
    }

    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_managed_group_configs(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ManagedGroupConfig>, DomainError> {
        self.repos.managed_configs.list(tenant_id).await
    }

    /// # Errors
    ///
    /// `Validation` when no stem is given, or storage failures.
    pub async fn create_managed_group_config(
        &self,
        tenant_id: TenantId,
        stems: &[String],
        admin_external_ids: &[String],
    ) -> Result<ManagedGroupConfig, DomainError> {
        let config = ManagedGroupConfig {
            id: Uuid::new_v4(),
            tenant_id,
            stems: normalize_ids(stems)?,
            admin_external_ids: merge_unique(&[admin_external_ids]),
            created_at: self.clock.now(),
            updated_at: None,
        };
        self.repos.managed_configs.insert(&config).await?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `NotFound`, `Validation` or storage failures.
    pub async fn update_managed_group_config(
        &self,
        config: ManagedGroupConfig,
    ) -> Result<ManagedGroupConfig, DomainError> {
        let existing = self
            .repos
            .managed_configs
            .find(config.tenant_id, config.id)
            .await?
            .ok_or_else(|| DomainError::not_found("managed group config", config.id))?;
        let updated = ManagedGroupConfig {
            stems: normalize_ids(&config.stems)?,
            admin_external_ids: merge_unique(&[config.admin_external_ids.as_slice()]),
            created_at: existing.created_at,
            updated_at: Some(self.clock.now()),
            ..config
        };
        self.repos.managed_configs.update(&updated).await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// `NotFound` or storage failures.
    pub async fn delete_managed_group_config(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<(), DomainError> {
        if self.repos.managed_configs.delete(tenant_id, id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("managed group config", id))
        }
    }

    async fn find_group(&self, tenant_id: TenantId, group_id: GroupId) -> Result<Group, DomainError> {
        self.repos
            .groups
            .find(tenant_id, group_id)
            .await?
            .ok_or_else(|| DomainError::not_found("group", group_id))
    }

    async fn find_membership(
        &self,
        tenant_id: TenantId,
        membership_id: MembershipId,
    ) -> Result<Membership, DomainError> {
        self.repos
            .memberships
            .find(tenant_id, membership_id)
            .await?
            .ok_or_else(|| DomainError::not_found("membership", membership_id))
    }
}

fn not_directory_backed() -> DomainError {
    DomainError::validation("directory_key", "group is not backed by the directory")
}

/// Trimmed, non-empty, first-occurrence-ordered union of the lists.
fn merge_unique(lists: &[&[String]]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in lists.iter().flat_map(|list| list.iter()) {
        let id = id.trim();
        if !id.is_empty() && !out.iter().any(|existing| existing == id) {
            out.push(id.to_owned());
        }
    }
    out
}

fn normalize_ids(stems: &[String]) -> Result<Vec<String>, DomainError> {
    let stems = merge_unique(&[stems]);
    if stems.is_empty() {
        return Err(DomainError::validation(
            "stems",
            "at least one stem is required",
        ));
    }
    Ok(stems)
}
