use async_trait::async_trait;
use group_sync_sdk::{ManagedGroupConfig, TenantId};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use super::entity::managed_group_config::{
    ActiveModel as ManagedConfigAM, Column, Entity as ManagedConfigEntity,
};
use crate::domain::error::DomainError;
use crate::domain::repo::ManagedGroupConfigRepository;

#[derive(Clone)]
pub struct SeaManagedGroupConfigRepository {
    db: DatabaseConnection,
}

impl SeaManagedGroupConfigRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ManagedGroupConfigRepository for SeaManagedGroupConfigRepository {
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<ManagedGroupConfig>, DomainError> {
        ManagedConfigEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(ManagedGroupConfig::try_from)
            .collect()
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<ManagedGroupConfig>, DomainError> {
        ManagedConfigEntity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?
            .map(ManagedGroupConfig::try_from)
            .transpose()
    }

    async fn insert(&self, config: &ManagedGroupConfig) -> Result<(), DomainError> {
        ManagedConfigEntity::insert(ManagedConfigAM::from(config))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn update(&self, config: &ManagedGroupConfig) -> Result<(), DomainError> {
        let result = ManagedConfigEntity::update(ManagedConfigAM::from(config))
            .filter(Column::TenantId.eq(config.tenant_id))
            .exec(&self.db)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => {
                Err(DomainError::not_found("managed group config", config.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, tenant_id: TenantId, id: Uuid) -> Result<bool, DomainError> {
        let result = ManagedConfigEntity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
