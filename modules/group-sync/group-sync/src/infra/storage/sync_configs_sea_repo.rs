use async_trait::async_trait;
use group_sync_sdk::{SyncConfig, TenantId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

use super::entity::sync_config::{ActiveModel as ConfigAM, Column, Entity as ConfigEntity};
use crate::domain::error::DomainError;
use crate::domain::repo::SyncConfigRepository;

#[derive(Clone)]
pub struct SeaSyncConfigRepository {
    db: DatabaseConnection,
}

impl SeaSyncConfigRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncConfigRepository for SeaSyncConfigRepository {
    async fn find(&self, tenant_id: TenantId) -> Result<Option<SyncConfig>, DomainError> {
        let found = ConfigEntity::find_by_id(tenant_id).one(&self.db).await?;
        Ok(found.map(Into::into))
    }

    async fn upsert(&self, config: &SyncConfig) -> Result<(), DomainError> {
        ConfigEntity::insert(ConfigAM::from(config))
            .on_conflict(
                OnConflict::column(Column::TenantId)
                    .update_columns([
                        Column::TimeoutMinutes,
                        Column::GroupTimeoutMinutes,
                        Column::TimeThresholdMinutes,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
