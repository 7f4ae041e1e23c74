//! Outbox entry entity for SeaORM.

use sea_orm::entity::prelude::*;

use common::{AppError, AppResult};
use domain::{NotificationKind, PendingNotification};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    pub kind: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub attempts: i32,
    pub next_attempt_at: DateTimeUtc,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub failed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PendingNotification {
    type Error = AppError;

    fn try_from(model: Model) -> AppResult<Self> {
        let kind: NotificationKind = model.kind.parse()?;
        Ok(PendingNotification {
            id: model.id,
            user_id: model.user_id,
            kind,
            payload: model.payload,
            attempts: u32::try_from(model.attempts).unwrap_or(0),
            next_attempt_at: model.next_attempt_at,
            last_error: model.last_error,
            failed_at: model.failed_at,
            created_at: model.created_at,
        })
    }
}
