use async_trait::async_trait;
use group_sync_sdk::{LocalUser, TenantId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use super::db::MAX_IN_LIST;
use super::entity::user::{ActiveModel as UserAM, Column, Entity as UserEntity};
use crate::domain::error::DomainError;
use crate::domain::repo::UserRepository;

#[derive(Clone)]
pub struct SeaUserRepository {
    db: DatabaseConnection,
}

impl SeaUserRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaUserRepository {
    async fn find_by_external_ids(
        &self,
        tenant_id: TenantId,
        external_ids: &[String],
    ) -> Result<Vec<LocalUser>, DomainError> {
        let mut users = Vec::new();
        for chunk in external_ids.chunks(MAX_IN_LIST) {
            let rows = UserEntity::find()
                .filter(Column::TenantId.eq(tenant_id))
                .filter(Column::ExternalId.is_in(chunk.iter().map(String::as_str)))
                .all(&self.db)
                .await?;
            users.extend(rows.into_iter().map(LocalUser::from));
        }
        Ok(users)
    }

    async fn upsert(&self, user: &LocalUser) -> Result<(), DomainError> {
        UserEntity::insert(UserAM::from(user))
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([Column::ExternalId, Column::Name, Column::Email])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
