//! Configuration for the group-sync module.

use std::collections::HashMap;
use std::time::Duration;

use group_sync_sdk::{DirectoryUser, StemGroup, TenantId};
use serde::{Deserialize, Serialize};

use crate::domain::enrich::DEFAULT_BATCH_SIZE;
use crate::domain::lease::MAX_LEASE_MINUTES;
use crate::domain::service::ServiceConfig;

/// Module configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupSyncConfig {
    /// Tenant lease timeout; a tenant run older than this is considered
    /// crashed and may be taken over.
    pub sync_timeout_minutes: i64,

    /// Group lease timeout.
    pub group_sync_timeout_minutes: i64,

    /// Minimum time between two completed tenant runs when the caller asks
    /// for the threshold check.
    pub sync_threshold_minutes: i64,

    /// Identifiers per directory profile lookup.
    pub enrichment_batch_size: usize,

    /// Groups reconciled concurrently within a tenant run.
    pub max_parallel_groups: usize,

    /// Administrators added to every managed stem group.
    pub admin_external_ids: Vec<String>,

    pub schedule: ScheduleConfig,

    /// Contents of the built-in static directory.
    pub directory: StaticDirectoryConfig,
}

impl Default for GroupSyncConfig {
    fn default() -> Self {
        Self {
            sync_timeout_minutes: 60,
            group_sync_timeout_minutes: 60,
            sync_threshold_minutes: 60,
            enrichment_batch_size: DEFAULT_BATCH_SIZE,
            max_parallel_groups: 4,
            admin_external_ids: Vec::new(),
            schedule: ScheduleConfig::default(),
            directory: StaticDirectoryConfig::default(),
        }
    }
}

impl GroupSyncConfig {
    /// Reject settings no run could work with.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value, min) in [
            ("sync_timeout_minutes", self.sync_timeout_minutes, 1),
            ("group_sync_timeout_minutes", self.group_sync_timeout_minutes, 1),
            ("sync_threshold_minutes", self.sync_threshold_minutes, 0),
        ] {
            if !(min..=MAX_LEASE_MINUTES).contains(&value) {
                return Err(format!(
                    "{field} must be between {min} and {MAX_LEASE_MINUTES}"
                ));
            }
        }
        if self.enrichment_batch_size == 0 {
            return Err("enrichment_batch_size must be at least 1".to_owned());
        }
        if self.max_parallel_groups == 0 {
            return Err("max_parallel_groups must be at least 1".to_owned());
        }
        if self.schedule.enabled && self.schedule.interval.is_zero() {
            return Err("schedule.interval must be greater than zero".to_owned());
        }
        Ok(())
    }

    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            sync_timeout_minutes: self.sync_timeout_minutes,
            group_sync_timeout_minutes: self.group_sync_timeout_minutes,
            sync_threshold_minutes: self.sync_threshold_minutes,
            enrichment_batch_size: self.enrichment_batch_size,
            max_parallel_groups: self.max_parallel_groups,
            admin_external_ids: self.admin_external_ids.clone(),
        }
    }
}

/// Periodic tenant synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    pub require_threshold: bool,

    pub tenants: Vec<TenantId>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60 * 60),
            require_threshold: true,
            tenants: Vec::new(),
        }
    }
}

/// Directory served from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticDirectoryConfig {
    /// Directory group key to member external ids.
    pub groups: HashMap<String, Vec<String>>,

    /// Profile attributes by external id.
    pub users: HashMap<String, DirectoryUser>,

    /// Stem to the groups found under it.
    pub stems: HashMap<String, Vec<StemGroup>>,
}
