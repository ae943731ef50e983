#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Test support utilities for group-sync integration tests.
//!
//! Provides an in-memory `SQLite` database, a directory wrapper that can
//! simulate outages and count calls, and seeding helpers.

#![allow(dead_code)] // Support module provides utilities that may not all be used

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use group_sync::config::GroupSyncConfig;
use group_sync::domain::clock::ManualClock;
use group_sync::domain::repo::{GroupRepository, MembershipRepository, UserRepository};
use group_sync::infra::directory::StaticDirectoryClient;
use group_sync::infra::storage::{
    SeaGroupRepository, SeaMembershipRepository, SeaUserRepository, migrations::Migrator,
};
use group_sync::module::GroupSyncModule;
use group_sync_sdk::{
    DirectoryClient, DirectoryError, DirectoryUser, Group, LocalUser, Membership,
    MembershipStatus, StemGroup, TenantId,
};
use parking_lot::RwLock;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

/// Fixed starting point for the manual clock.
#[must_use]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

/// Create a fresh in-memory `SQLite` database with migrations applied.
///
/// # Panics
/// Panics if the database connection or migrations fail.
pub async fn inmem_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    // one connection, otherwise every pooled connection sees its own database
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Static directory that can be edited between runs, made unreachable per
/// group key, and counts profile lookups.
#[derive(Default)]
pub struct TestDirectory {
    inner: RwLock<StaticDirectoryClient>,
    unreachable: RwLock<HashSet<String>>,
    pub list_users_calls: AtomicUsize,
    pub list_users_sizes: RwLock<Vec<usize>>,
}

impl TestDirectory {
    pub fn set_group(&self, key: &str, members: &[&str]) {
        let mut inner = self.inner.write();
        *inner = inner.clone().with_group(key, members);
    }

    pub fn set_user(&self, external_id: &str, name: &str, email: &str) {
        let mut inner = self.inner.write();
        *inner = inner.clone().with_user(external_id, name, email);
    }

    pub fn set_stem(&self, stem: &str, groups: Vec<StemGroup>) {
        let mut inner = self.inner.write();
        *inner = inner.clone().with_stem(stem, groups);
    }

    pub fn take_down(&self, key: &str) {
        self.unreachable.write().insert(key.to_owned());
    }

    pub fn bring_up(&self, key: &str) {
        self.unreachable.write().remove(key);
    }

    fn client(&self) -> StaticDirectoryClient {
        self.inner.read().clone()
    }
}

#[async_trait]
impl DirectoryClient for TestDirectory {
    async fn list_members(&self, group_key: &str) -> Result<Vec<String>, DirectoryError> {
        if self.unreachable.read().contains(group_key) {
            return Err(DirectoryError::Timeout {
                operation: format!("list_members({group_key})"),
            });
        }
        self.client().list_members(group_key).await
    }

    async fn list_users(
        &self,
        external_ids: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, DirectoryError> {
        self.list_users_calls.fetch_add(1, Ordering::SeqCst);
        self.list_users_sizes.write().push(external_ids.len());
        self.client().list_users(external_ids).await
    }

    async fn list_stem_groups(&self, stem: &str) -> Result<Vec<StemGroup>, DirectoryError> {
        if self.unreachable.read().contains(stem) {
            return Err(DirectoryError::Transport(format!("{stem}: connection refused")));
        }
        self.client().list_stem_groups(stem).await
    }
}

/// A module wired against an in-memory database, a [`TestDirectory`] and a
/// manual clock.
pub struct Harness {
    pub db: DatabaseConnection,
    pub module: GroupSyncModule,
    pub directory: Arc<TestDirectory>,
    pub clock: Arc<ManualClock>,
    pub tenant: TenantId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(GroupSyncConfig::default()).await
    }

    pub async fn with_config(config: GroupSyncConfig) -> Self {
        let db = inmem_db().await;
        let directory = Arc::new(TestDirectory::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let module = GroupSyncModule::init_with(&db, config, directory.clone(), clock.clone())
            .await
            .expect("module init");
        Self {
            db,
            module,
            directory,
            clock,
            tenant: Uuid::new_v4(),
        }
    }

    pub async fn seed_group(&self, title: &str, key: Option<&str>) -> Group {
        let group = Group {
            id: Uuid::new_v4(),
            tenant_id: self.tenant,
            title: title.to_owned(),
            directory_key: key.map(str::to_owned),
            embedded_members: false,
            can_join_automatically: false,
            created_at: t0(),
            updated_at: None,
        };
        SeaGroupRepository::new(self.db.clone())
            .insert(&group)
            .await
            .expect("seed group");
        group
    }

    pub async fn seed_membership(
        &self,
        group: &Group,
        external_id: &str,
        status: MembershipStatus,
    ) -> Membership {
        let membership = Membership {
            id: Uuid::new_v4(),
            tenant_id: self.tenant,
            group_id: group.id,
            external_id: external_id.to_owned(),
            user_id: None,
            name: format!("{external_id} name"),
            email: format!("{}@example.edu", external_id.to_lowercase()),
            status,
            reject_reason: None,
            sync_epoch: None,
            created_at: t0(),
            updated_at: None,
        };
        SeaMembershipRepository::new(self.db.clone())
            .insert(&membership)
            .await
            .expect("seed membership");
        membership
    }

    pub async fn seed_user(&self, external_id: &str, name: &str) -> LocalUser {
        let user = LocalUser {
            id: Uuid::new_v4(),
            tenant_id: self.tenant,
            external_id: external_id.to_owned(),
            name: name.to_owned(),
            email: format!("{}@example.edu", external_id.to_lowercase()),
        };
        SeaUserRepository::new(self.db.clone())
            .upsert(&user)
            .await
            .expect("seed user");
        user
    }

    pub async fn members(&self, group: &Group) -> Vec<Membership> {
        let mut list = SeaMembershipRepository::new(self.db.clone())
            .list_by_group(self.tenant, group.id)
            .await
            .expect("list memberships");
        list.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        list
    }

    pub async fn statuses(&self, group: &Group) -> Vec<(String, MembershipStatus)> {
        self.members(group)
            .await
            .into_iter()
            .map(|m| (m.external_id, m.status))
            .collect()
    }
}
