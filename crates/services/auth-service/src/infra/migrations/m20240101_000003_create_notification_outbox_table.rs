//! Migration: Create the notification outbox table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationOutbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationOutbox::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NotificationOutbox::UserId).big_integer().not_null())
                    .col(ColumnDef::new(NotificationOutbox::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(NotificationOutbox::Payload).text().not_null())
                    .col(
                        ColumnDef::new(NotificationOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::NextAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationOutbox::LastError).text().null())
                    .col(
                        ColumnDef::new(NotificationOutbox::FailedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NotificationOutbox::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One pending entry per user and event
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_outbox_user_kind")
                    .table(NotificationOutbox::Table)
                    .col(NotificationOutbox::UserId)
                    .col(NotificationOutbox::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_outbox_next_attempt_at")
                    .table(NotificationOutbox::Table)
                    .col(NotificationOutbox::NextAttemptAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationOutbox::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum NotificationOutbox {
    Table,
    Id,
    UserId,
    Kind,
    Payload,
    Attempts,
    NextAttemptAt,
    LastError,
    FailedAt,
    CreatedAt,
}
