use async_trait::async_trait;
use group_sync_sdk::{GroupId, Membership, MembershipId, TenantId, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

use super::db::MAX_IN_LIST;
use super::entity::membership::{ActiveModel as MembershipAM, Column, Entity as MembershipEntity};
use crate::domain::error::DomainError;
use crate::domain::reconcile::{ReconciliationPlan, Upsert};
use crate::domain::repo::{MembershipRepository, PlanFn};

#[derive(Clone)]
pub struct SeaMembershipRepository {
    db: DatabaseConnection,
}

impl SeaMembershipRepository {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn load_group<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    group_id: GroupId,
) -> Result<Vec<Membership>, DbErr> {
    let rows = MembershipEntity::find()
        .filter(Column::TenantId.eq(tenant_id))
        .filter(Column::GroupId.eq(group_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(Membership::from).collect())
}

async fn insert_row<C: ConnectionTrait>(conn: &C, membership: &Membership) -> Result<(), DbErr> {
    MembershipEntity::insert(MembershipAM::from(membership))
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn update_row<C: ConnectionTrait>(
    conn: &C,
    membership: &Membership,
) -> Result<(), DomainError> {
    let result = MembershipEntity::update(MembershipAM::from(membership))
        .filter(Column::TenantId.eq(membership.tenant_id))
        .exec(conn)
        .await;
    match result {
        Ok(_) => Ok(()),
        Err(DbErr::RecordNotUpdated) => Err(DomainError::not_found("membership", membership.id)),
        Err(e) => Err(e.into()),
    }
}

async fn write_plan<C: ConnectionTrait>(
    conn: &C,
    plan: &ReconciliationPlan,
) -> Result<(), DomainError> {
    for upsert in &plan.upserts {
        match upsert {
            Upsert::Create(m) => insert_row(conn, m).await?,
            Upsert::Update(m) => update_row(conn, m).await?,
        }
    }

    for chunk in plan.confirmed.chunks(MAX_IN_LIST) {
        MembershipEntity::update_many()
            .col_expr(Column::SyncEpoch, Expr::value(Some(plan.epoch)))
            .filter(Column::Id.is_in(chunk.iter().copied()))
            .exec(conn)
            .await?;
    }

    let stale: Vec<MembershipId> = plan.stale_to_remove.iter().map(|m| m.id).collect();
    for chunk in stale.chunks(MAX_IN_LIST) {
        MembershipEntity::delete_many()
            .filter(Column::Id.is_in(chunk.iter().copied()))
            .exec(conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl MembershipRepository for SeaMembershipRepository {
    async fn list_by_group(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
    ) -> Result<Vec<Membership>, DomainError> {
        Ok(load_group(&self.db, tenant_id, group_id).await?)
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        id: MembershipId,
    ) -> Result<Option<Membership>, DomainError> {
        let found = MembershipEntity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn find_by_external_id(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        external_id: &str,
    ) -> Result<Option<Membership>, DomainError> {
        let found = MembershipEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn find_by_user(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<Option<Membership>, DomainError> {
        let found = MembershipEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(found.map(Into::into))
    }

    async fn insert(&self, membership: &Membership) -> Result<(), DomainError> {
        Ok(insert_row(&self.db, membership).await?)
    }

    async fn update(&self, membership: &Membership) -> Result<(), DomainError> {
        update_row(&self.db, membership).await
    }

    async fn delete(&self, tenant_id: TenantId, id: MembershipId) -> Result<bool, DomainError> {
        let result = MembershipEntity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn reconcile_in_tx(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        plan: PlanFn,
    ) -> Result<ReconciliationPlan, DomainError> {
        let written = self
            .db
            .transaction::<_, ReconciliationPlan, DomainError>(move |txn| {
                Box::pin(async move {
                    let local = load_group(txn, tenant_id, group_id).await?;
                    let plan = plan(&local);
                    write_plan(txn, &plan).await?;
                    Ok(plan)
                })
            })
            .await?;
        Ok(written)
    }

    async fn fill_profiles(&self, memberships: &[Membership]) -> Result<usize, DomainError> {
        let mut touched = 0;
        for m in memberships {
            let mut wrote = false;
            // Never overwrites a value written since the record was read.
            if !m.name.is_empty() {
                let result = MembershipEntity::update_many()
                    .col_expr(Column::Name, Expr::value(m.name.as_str()))
                    .filter(Column::Id.eq(m.id))
                    .filter(Column::Name.eq(""))
                    .exec(&self.db)
                    .await?;
                wrote |= result.rows_affected > 0;
            }
            if !m.email.is_empty() {
                let result = MembershipEntity::update_many()
                    .col_expr(Column::Email, Expr::value(m.email.as_str()))
                    .filter(Column::Id.eq(m.id))
                    .filter(Column::Email.eq(""))
                    .exec(&self.db)
                    .await?;
                wrote |= result.rows_affected > 0;
            }
            if wrote {
                touched += 1;
            }
        }
        Ok(touched)
    }
}
