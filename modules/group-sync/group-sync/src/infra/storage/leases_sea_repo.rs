use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_sync_sdk::SyncLease;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use super::entity::sync_lease::{ActiveModel as LeaseAM, Column, Entity as LeaseEntity};
use crate::domain::error::DomainError;
use crate::domain::repo::LeaseRepository;

/// Lease rows with compare-and-swap writes.
#[derive(Clone)]
pub struct SeaLeaseRepository {
    db: DatabaseConnection,
}

impl SeaLeaseRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeaseRepository for SeaLeaseRepository {
    async fn find(&self, scope_key: &str) -> Result<Option<SyncLease>, DomainError> {
        let found = LeaseEntity::find_by_id(scope_key.to_owned())
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn insert_if_absent(&self, lease: &SyncLease) -> Result<bool, DomainError> {
        let inserted = LeaseEntity::insert(LeaseAM::from(lease))
            .on_conflict(OnConflict::column(Column::ScopeKey).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted == 1)
    }

    async fn replace(
        &self,
        observed_holder: Uuid,
        observed_released: bool,
        lease: &SyncLease,
    ) -> Result<bool, DomainError> {
        let update = LeaseEntity::update_many()
            .col_expr(Column::HolderId, Expr::value(lease.holder_id))
            .col_expr(Column::StartedAt, Expr::value(lease.started_at))
            .col_expr(Column::EndedAt, Expr::value(lease.ended_at))
            .col_expr(Column::TimeoutMinutes, Expr::value(lease.timeout_minutes))
            .filter(Column::ScopeKey.eq(lease.scope_key.as_str()))
            .filter(Column::HolderId.eq(observed_holder));
        let update = if observed_released {
            update.filter(Column::EndedAt.is_not_null())
        } else {
            update.filter(Column::EndedAt.is_null())
        };

        let result = update.exec(&self.db).await?;
        Ok(result.rows_affected == 1)
    }

    async fn release(
        &self,
        scope_key: &str,
        holder_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = LeaseEntity::update_many()
            .col_expr(Column::EndedAt, Expr::value(Some(ended_at)))
            .filter(Column::ScopeKey.eq(scope_key))
            .filter(Column::HolderId.eq(holder_id))
            .filter(Column::EndedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
