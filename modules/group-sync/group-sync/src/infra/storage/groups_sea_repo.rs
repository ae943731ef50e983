use async_trait::async_trait;
use group_sync_sdk::{Group, GroupId, TenantId};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use super::entity::group::{ActiveModel as GroupAM, Column, Entity as GroupEntity};
use crate::domain::error::DomainError;
use crate::domain::repo::GroupRepository;

#[derive(Clone)]
pub struct SeaGroupRepository {
    db: DatabaseConnection,
}

impl SeaGroupRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GroupRepository for SeaGroupRepository {
    async fn find(&self, tenant_id: TenantId, id: GroupId) -> Result<Option<Group>, DomainError> {
        let found = GroupEntity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn find_by_directory_key(
        &self,
        tenant_id: TenantId,
        directory_key: &str,
    ) -> Result<Option<Group>, DomainError> {
        let found = GroupEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::DirectoryKey.eq(directory_key))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn list_directory_backed(&self, tenant_id: TenantId) -> Result<Vec<Group>, DomainError> {
        let rows = GroupEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::DirectoryKey.is_not_null())
            .filter(Column::DirectoryKey.ne(""))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn insert(&self, group: &Group) -> Result<(), DomainError> {
        GroupEntity::insert(GroupAM::from(group))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn update(&self, group: &Group) -> Result<(), DomainError> {
        let result = GroupEntity::update(GroupAM::from(group))
            .filter(Column::TenantId.eq(group.tenant_id))
            .exec(&self.db)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(DomainError::not_found("group", group.id)),
            Err(e) => Err(e.into()),
        }
    }
}
