//! Migration: Create the dormant users table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Ids are carried over from the active table, never generated here
        manager
            .create_table(
                Table::create()
                    .table(DormantUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DormantUsers::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DormantUsers::Username)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(DormantUsers::PasswordHash).string().not_null())
                    .col(ColumnDef::new(DormantUsers::DormantDate).date().not_null())
                    .to_owned(),
            )
            .await?;

        // The purge sweep scans by date
        manager
            .create_index(
                Index::create()
                    .name("idx_dormant_users_dormant_date")
                    .table(DormantUsers::Table)
                    .col(DormantUsers::DormantDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_dormant_users_dormant_date")
                    .table(DormantUsers::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(DormantUsers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DormantUsers {
    Table,
    Id,
    Username,
    PasswordHash,
    DormantDate,
}
