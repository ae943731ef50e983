use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Local-only members have an empty external id, so uniqueness only holds
// among directory-keyed rows.
const MEMBERSHIP_EXTERNAL_UNIQUE: &str = "CREATE UNIQUE INDEX IF NOT EXISTS ux_memberships_group_external \
     ON memberships (group_id, external_id) WHERE external_id <> ''";

const MEMBERSHIP_USER_UNIQUE: &str = "CREATE UNIQUE INDEX IF NOT EXISTS ux_memberships_group_user \
     ON memberships (group_id, user_id) WHERE user_id IS NOT NULL AND external_id = ''";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(groups_table()).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("ix_groups_tenant_directory_key")
                    .table(Groups::Table)
                    .col(Groups::TenantId)
                    .col(Groups::DirectoryKey)
                    .to_owned(),
            )
            .await?;

        manager.create_table(memberships_table()).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("ix_memberships_tenant_group")
                    .table(Memberships::Table)
                    .col(Memberships::TenantId)
                    .col(Memberships::GroupId)
                    .to_owned(),
            )
            .await?;
        let db = manager.get_connection();
        db.execute_unprepared(MEMBERSHIP_EXTERNAL_UNIQUE).await?;
        db.execute_unprepared(MEMBERSHIP_USER_UNIQUE).await?;

        manager.create_table(users_table()).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("ux_users_tenant_external")
                    .table(Users::Table)
                    .col(Users::TenantId)
                    .col(Users::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager.create_table(sync_leases_table()).await?;
        manager.create_table(sync_configs_table()).await?;
        manager.create_table(managed_group_configs_table()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ManagedGroupConfigs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncConfigs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncLeases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Memberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await
    }
}

fn groups_table() -> TableCreateStatement {
    Table::create()
        .table(Groups::Table)
        .if_not_exists()
        .col(ColumnDef::new(Groups::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Groups::TenantId).uuid().not_null())
        .col(ColumnDef::new(Groups::Title).string().not_null())
        .col(ColumnDef::new(Groups::DirectoryKey).string())
        .col(
            ColumnDef::new(Groups::EmbeddedMembers)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Groups::CanJoinAutomatically)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Groups::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Groups::UpdatedAt).timestamp_with_time_zone())
        .to_owned()
}

fn memberships_table() -> TableCreateStatement {
    Table::create()
        .table(Memberships::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Memberships::Id)
                .uuid()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Memberships::TenantId).uuid().not_null())
        .col(ColumnDef::new(Memberships::GroupId).uuid().not_null())
        .col(
            ColumnDef::new(Memberships::ExternalId)
                .string()
                .not_null()
                .default(""),
        )
        .col(ColumnDef::new(Memberships::UserId).uuid())
        .col(
            ColumnDef::new(Memberships::Name)
                .string()
                .not_null()
                .default(""),
        )
        .col(
            ColumnDef::new(Memberships::Email)
                .string()
                .not_null()
                .default(""),
        )
        .col(ColumnDef::new(Memberships::Status).string_len(16).not_null())
        .col(ColumnDef::new(Memberships::RejectReason).text())
        .col(ColumnDef::new(Memberships::SyncEpoch).uuid())
        .col(
            ColumnDef::new(Memberships::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Memberships::UpdatedAt).timestamp_with_time_zone())
        .foreign_key(
            ForeignKey::create()
                .name("fk_memberships_group")
                .from(Memberships::Table, Memberships::GroupId)
                .to(Groups::Table, Groups::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

fn users_table() -> TableCreateStatement {
    Table::create()
        .table(Users::Table)
        .if_not_exists()
        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Users::TenantId).uuid().not_null())
        .col(ColumnDef::new(Users::ExternalId).string().not_null())
        .col(ColumnDef::new(Users::Name).string().not_null().default(""))
        .col(ColumnDef::new(Users::Email).string().not_null().default(""))
        .to_owned()
}

fn sync_leases_table() -> TableCreateStatement {
    Table::create()
        .table(SyncLeases::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(SyncLeases::ScopeKey)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(SyncLeases::HolderId).uuid().not_null())
        .col(
            ColumnDef::new(SyncLeases::StartedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(SyncLeases::EndedAt).timestamp_with_time_zone())
        .col(
            ColumnDef::new(SyncLeases::TimeoutMinutes)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn sync_configs_table() -> TableCreateStatement {
    Table::create()
        .table(SyncConfigs::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(SyncConfigs::TenantId)
                .uuid()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(SyncConfigs::TimeoutMinutes)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(SyncConfigs::GroupTimeoutMinutes)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(SyncConfigs::TimeThresholdMinutes)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn managed_group_configs_table() -> TableCreateStatement {
    Table::create()
        .table(ManagedGroupConfigs::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(ManagedGroupConfigs::Id)
                .uuid()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(ManagedGroupConfigs::TenantId).uuid().not_null())
        .col(ColumnDef::new(ManagedGroupConfigs::Stems).json().not_null())
        .col(
            ColumnDef::new(ManagedGroupConfigs::AdminExternalIds)
                .json()
                .not_null(),
        )
        .col(
            ColumnDef::new(ManagedGroupConfigs::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(ManagedGroupConfigs::UpdatedAt).timestamp_with_time_zone())
        .to_owned()
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
    TenantId,
    Title,
    DirectoryKey,
    EmbeddedMembers,
    CanJoinAutomatically,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Memberships {
    Table,
    Id,
    TenantId,
    GroupId,
    ExternalId,
    UserId,
    Name,
    Email,
    Status,
    RejectReason,
    SyncEpoch,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    TenantId,
    ExternalId,
    Name,
    Email,
}

#[derive(DeriveIden)]
enum SyncLeases {
    Table,
    ScopeKey,
    HolderId,
    StartedAt,
    EndedAt,
    TimeoutMinutes,
}

#[derive(DeriveIden)]
enum SyncConfigs {
    Table,
    TenantId,
    GroupTimeoutMinutes,
    TimeoutMinutes,
    TimeThresholdMinutes,
}

#[derive(DeriveIden)]
enum ManagedGroupConfigs {
    Table,
    Id,
    TenantId,
    Stems,
    AdminExternalIds,
    CreatedAt,
    UpdatedAt,
}
