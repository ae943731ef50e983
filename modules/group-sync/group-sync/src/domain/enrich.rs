//! Batched profile enrichment from the directory.

use std::collections::HashSet;

use group_sync_sdk::{DirectoryClient, DirectoryUser, Membership, MembershipId};

/// Upper bound on identifiers sent in one directory lookup.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub enriched: usize,
    /// Records the directory had nothing new for.
    pub unchanged: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Every input record, in input order.
    pub memberships: Vec<Membership>,
    pub changed: HashSet<MembershipId>,
    pub stats: EnrichmentStats,
}

impl EnrichmentOutcome {
    pub fn changed_memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships
            .iter()
            .filter(|m| self.changed.contains(&m.id))
    }
}

/// Fill empty fields from the directory entry. Non-empty local values are
/// never replaced. Returns whether anything changed.
pub fn merge_profile(membership: &mut Membership, upstream: &DirectoryUser) -> bool {
    let mut changed = false;
    if membership.name.is_empty() && !upstream.name.is_empty() {
        membership.name.clone_from(&upstream.name);
        changed = true;
    }
    if membership.email.is_empty() && !upstream.email.is_empty() {
        membership.email.clone_from(&upstream.email);
        changed = true;
    }
    changed
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichmentBatcher {
    batch_size: usize,
}

impl Default for EnrichmentBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl EnrichmentBatcher {
    /// A zero batch size is treated as one.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Enrich records missing a name or email. Records with a complete
    /// profile or without an external id pass through untouched. A failed
    /// batch leaves its records blank for the next run.
    pub async fn enrich(
        &self,
        directory: &dyn DirectoryClient,
        mut memberships: Vec<Membership>,
    ) -> EnrichmentOutcome {
        let mut stats = EnrichmentStats::default();
        let mut changed = HashSet::new();

        let candidates: Vec<usize> = memberships
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_missing_profile() && !m.external_id.is_empty())
            .map(|(i, _)| i)
            .collect();

        for batch in candidates.chunks(self.batch_size) {
            let external_ids: Vec<String> = batch
                .iter()
                .map(|&i| memberships[i].external_id.clone())
                .collect();

            let profiles = match directory.list_users(&external_ids).await {
                Ok(profiles) => profiles,
                Err(e) => {
                    tracing::warn!(
                        batch_len = batch.len(),
                        error = %e,
                        "enrichment batch failed, records keep blank fields"
                    );
                    stats.failed_batches += 1;
                    continue;
                }
            };

            for &i in batch {
                let membership = &mut memberships[i];
                let Some(upstream) = profiles.get(&membership.external_id) else {
                    tracing::debug!(external_id = %membership.external_id, "no directory entry for member");
                    stats.unchanged += 1;
                    continue;
                };
                if merge_profile(membership, upstream) {
                    changed.insert(membership.id);
                    stats.enriched += 1;
                } else {
                    tracing::debug!(external_id = %membership.external_id, "directory had no new profile data");
                    stats.unchanged += 1;
                }
            }
        }

        EnrichmentOutcome {
            memberships,
            changed,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Utc;
    use group_sync_sdk::{DirectoryError, MembershipStatus, StemGroup};
    use parking_lot::Mutex;
    use uuid::Uuid;

    use super::*;

    struct FakeDirectory {
        users: HashMap<String, DirectoryUser>,
        calls: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
    }

    impl FakeDirectory {
        fn new(users: &[(&str, &str, &str)]) -> Self {
            Self {
                users: users
                    .iter()
                    .map(|(id, name, email)| {
                        (
                            (*id).to_owned(),
                            DirectoryUser {
                                name: (*name).to_owned(),
                                email: (*email).to_owned(),
                            },
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
            }
        }
    }

    #[async_trait]
    impl DirectoryClient for FakeDirectory {
        async fn list_members(&self, _group_key: &str) -> Result<Vec<String>, DirectoryError> {
            Ok(Vec::new())
        }

        async fn list_users(
            &self,
            external_ids: &[String],
        ) -> Result<HashMap<String, DirectoryUser>, DirectoryError> {
            let call = {
                let mut calls = self.calls.lock();
                calls.push(external_ids.len());
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(DirectoryError::Timeout {
                    operation: "list_users".to_owned(),
                });
            }
            Ok(external_ids
                .iter()
                .filter_map(|id| self.users.get(id).map(|u| (id.clone(), u.clone())))
                .collect())
        }

        async fn list_stem_groups(&self, _stem: &str) -> Result<Vec<StemGroup>, DirectoryError> {
            Ok(Vec::new())
        }
    }

    fn blank(external_id: &str) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            group_id: Uuid::nil(),
            external_id: external_id.to_owned(),
            user_id: None,
            name: String::new(),
            email: String::new(),
            status: MembershipStatus::Member,
            reject_reason: None,
            sync_epoch: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn fills_only_fields_the_directory_knows() {
        let directory = FakeDirectory::new(&[("E1", "Jane Doe", "")]);

        let outcome = EnrichmentBatcher::default()
            .enrich(&directory, vec![blank("E1")])
            .await;

        assert_eq!(outcome.memberships[0].name, "Jane Doe");
        assert_eq!(outcome.memberships[0].email, "");
        assert_eq!(outcome.stats.enriched, 1);
        assert_eq!(outcome.changed_memberships().count(), 1);
    }

    #[tokio::test]
    async fn never_overwrites_known_values() {
        let directory = FakeDirectory::new(&[("E1", "Upstream Name", "up@example.edu")]);
        let mut local = blank("E1");
        local.name = "Local Name".to_owned();

        let outcome = EnrichmentBatcher::default()
            .enrich(&directory, vec![local])
            .await;

        assert_eq!(outcome.memberships[0].name, "Local Name");
        assert_eq!(outcome.memberships[0].email, "up@example.edu");
    }

    #[tokio::test]
    async fn complete_and_local_records_are_not_submitted() {
        let directory = FakeDirectory::new(&[]);
        let mut complete = blank("E1");
        complete.name = "A".to_owned();
        complete.email = "a@example.edu".to_owned();
        let local_only = blank("");

        let outcome = EnrichmentBatcher::default()
            .enrich(&directory, vec![complete.clone(), local_only.clone()])
            .await;

        assert!(directory.calls.lock().is_empty());
        assert_eq!(outcome.memberships, vec![complete, local_only]);
    }

    #[tokio::test]
    async fn splits_into_bounded_batches() {
        let directory = FakeDirectory::new(&[]);
        let input: Vec<Membership> = (0..7).map(|i| blank(&format!("E{i}"))).collect();

        let outcome = EnrichmentBatcher::new(3).enrich(&directory, input).await;

        assert_eq!(*directory.calls.lock(), vec![3, 3, 1]);
        assert_eq!(outcome.stats.unchanged, 7);
        assert!(outcome.changed.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_is_skipped() {
        let mut directory = FakeDirectory::new(&[
            ("E0", "Zero", "zero@example.edu"),
            ("E2", "Two", "two@example.edu"),
        ]);
        directory.fail_on_call = Some(1);
        let input: Vec<Membership> = (0..3).map(|i| blank(&format!("E{i}"))).collect();

        let outcome = EnrichmentBatcher::new(2).enrich(&directory, input).await;

        assert_eq!(outcome.stats.failed_batches, 1);
        assert_eq!(outcome.stats.enriched, 1);
        assert!(outcome.memberships[0].name.is_empty());
        assert_eq!(outcome.memberships[2].name, "Two");
    }
}
