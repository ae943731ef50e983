//! sea-orm persistence behind the domain repository traits.
//!
//! ## Concurrency
//!
//! Lease rows are only ever written with conditional statements; the
//! affected row count tells the caller whether its compare-and-swap won.
//! Membership reconciliation reads and writes one group inside a single
//! transaction.

pub mod db;
pub mod entity;
pub mod groups_sea_repo;
pub mod leases_sea_repo;
pub mod managed_configs_sea_repo;
pub mod mapper;
pub mod memberships_sea_repo;
pub mod migrations;
pub mod sync_configs_sea_repo;
pub mod users_sea_repo;

pub use groups_sea_repo::SeaGroupRepository;
pub use leases_sea_repo::SeaLeaseRepository;
pub use managed_configs_sea_repo::SeaManagedGroupConfigRepository;
pub use memberships_sea_repo::SeaMembershipRepository;
pub use sync_configs_sea_repo::SeaSyncConfigRepository;
pub use users_sea_repo::SeaUserRepository;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::domain::service::Repositories;

/// Every repository backed by the same connection pool.
#[must_use]
pub fn repositories(db: &DatabaseConnection) -> Repositories {
    Repositories {
        groups: Arc::new(SeaGroupRepository::new(db.clone())),
        memberships: Arc::new(SeaMembershipRepository::new(db.clone())),
        users: Arc::new(SeaUserRepository::new(db.clone())),
        leases: Arc::new(SeaLeaseRepository::new(db.clone())),
        sync_configs: Arc::new(SeaSyncConfigRepository::new(db.clone())),
        managed_configs: Arc::new(SeaManagedGroupConfigRepository::new(db.clone())),
    }
}
