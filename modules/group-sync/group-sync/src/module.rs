//! Module wiring: migrations, repositories, directory, service, scheduler.

use std::sync::Arc;

use group_sync_sdk::{DirectoryClient, GroupSyncClient, TenantId};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{GroupSyncConfig, ScheduleConfig};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::error::DomainError;
use crate::domain::service::Service;
use crate::infra::directory::StaticDirectoryClient;
use crate::infra::storage::{self, migrations::Migrator};
use crate::local_client::LocalClient;

/// Assembled group-sync module.
pub struct GroupSyncModule {
    service: Arc<Service>,
    client: Arc<LocalClient>,
    schedule: ScheduleConfig,
}

impl GroupSyncModule {
    /// Validate `config`, migrate the schema and wire the module against
    /// the static directory from configuration.
    ///
    /// # Errors
    ///
    /// Invalid configuration or a failed migration.
    pub async fn init(db: &DatabaseConnection, config: GroupSyncConfig) -> Result<Self, DomainError> {
        let directory = Arc::new(StaticDirectoryClient::from_config(&config.directory));
        Self::init_with(db, config, directory, Arc::new(SystemClock)).await
    }

    /// Like [`Self::init`] with an explicit directory and clock.
    ///
    /// # Errors
    ///
    /// Invalid configuration or a failed migration.
    pub async fn init_with(
        db: &DatabaseConnection,
        config: GroupSyncConfig,
        directory: Arc<dyn DirectoryClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        config
            .validate()
            .map_err(|message| DomainError::validation("config", message))?;
        Migrator::up(db, None).await?;

        let service = Arc::new(Service::new(
            storage::repositories(db),
            directory,
            clock,
            config.service_config(),
        ));
        let client = Arc::new(LocalClient::new(service.clone()));
        tracing::info!(
            scheduled_tenants = config.schedule.tenants.len(),
            schedule_enabled = config.schedule.enabled,
            "group-sync module initialized"
        );
        Ok(Self {
            service,
            client,
            schedule: config.schedule,
        })
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn GroupSyncClient> {
        self.client.clone()
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    /// Start the periodic tenant sync. Returns `None` when scheduling is
    /// disabled or no tenant is configured.
    #[must_use]
    pub fn spawn_scheduler(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.schedule.enabled || self.schedule.tenants.is_empty() {
            return None;
        }
        let service = self.service.clone();
        let schedule = self.schedule.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(schedule.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::info!("group-sync scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        run_scheduled(&service, &schedule.tenants, schedule.require_threshold).await;
                    }
                }
            }
        }))
    }
}

async fn run_scheduled(service: &Service, tenants: &[TenantId], require_threshold: bool) {
    for &tenant_id in tenants {
        match service.run_tenant_sync(tenant_id, require_threshold).await {
            Ok(summary) if summary.is_partial() => tracing::warn!(
                tenant_id = %tenant_id,
                failed_groups = summary.failed_groups().count(),
                stem_failures = summary.stem_failures.len(),
                "scheduled sync finished with failures"
            ),
            Ok(_) => {}
            Err(DomainError::LeaseDenied { scope, reason }) => tracing::info!(
                tenant_id = %tenant_id,
                scope = %scope,
                reason = ?reason,
                "scheduled sync skipped"
            ),
            Err(e) => tracing::error!(tenant_id = %tenant_id, error = %e, "scheduled sync failed"),
        }
    }
}
