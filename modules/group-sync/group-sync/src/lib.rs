//! Group-sync module.
//!
//! Keeps directory-backed group memberships consistent with an external
//! authoritative directory:
//! - a lease coordinator keeps runs for the same tenant or group exclusive
//! - a pure reconciler diffs the directory member list against local state
//! - an enrichment batcher fills missing profiles from the directory
//!
//! Consumers talk to it through [`group_sync_sdk::GroupSyncClient`], built by
//! [`module::GroupSyncModule`].

pub use group_sync_sdk;

pub mod config;
pub mod domain;
pub mod infra;
pub mod local_client;
pub mod module;

pub use config::GroupSyncConfig;
pub use module::GroupSyncModule;
