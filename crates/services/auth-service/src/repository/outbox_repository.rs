//! Notification outbox repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::notification_outbox::{self, ActiveModel, Entity as OutboxEntity, Model};
use common::{AppError, AppResult};
use domain::{NotificationKind, PendingNotification, UserId};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Durable queue of notifications awaiting delivery.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Park a notification. If an entry for the same `(user_id, kind)` already
    /// exists it is returned instead; a parked-as-failed one is re-armed first
    /// so the relay picks it up again.
    async fn enqueue(&self, pending: PendingNotification) -> AppResult<PendingNotification>;

    /// Drop the entry for `(user_id, kind)`, if any. Returns whether one existed.
    async fn resolve(&self, user_id: UserId, kind: NotificationKind) -> AppResult<bool>;

    /// Entries due at `now`, oldest schedule first, at most `limit`
    async fn due(&self, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<PendingNotification>>;

    /// Persist attempt bookkeeping for an entry
    async fn update(&self, pending: &PendingNotification) -> AppResult<()>;

    /// Remove an entry by ID
    async fn remove(&self, id: Uuid) -> AppResult<()>;
}

/// SeaORM implementation of [`OutboxRepository`].
pub struct OutboxStore {
    db: DatabaseConnection,
}

impl OutboxStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_by_key(
        &self,
        user_id: UserId,
        kind: NotificationKind,
    ) -> AppResult<Option<Model>> {
        let model = OutboxEntity::find()
            .filter(notification_outbox::Column::UserId.eq(user_id))
            .filter(notification_outbox::Column::Kind.eq(kind.as_str()))
            .one(&self.db)
            .await?;
        Ok(model)
    }

    async fn store_attempt_state(
        &self,
        pending: &PendingNotification,
        payload: Option<&str>,
    ) -> AppResult<()> {
        let existing = OutboxEntity::find_by_id(pending.id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::internal(format!("Outbox entry {} vanished", pending.id)))?;

        let mut active_model: ActiveModel = existing.into();
        if let Some(payload) = payload {
            active_model.payload = Set(payload.to_string());
        }
        active_model.attempts = Set(attempts_column(pending.attempts));
        active_model.next_attempt_at = Set(pending.next_attempt_at);
        active_model.last_error = Set(pending.last_error.clone());
        active_model.failed_at = Set(pending.failed_at);
        active_model.update(&self.db).await?;

        Ok(())
    }
}

fn attempts_column(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl OutboxRepository for OutboxStore {
    async fn enqueue(&self, pending: PendingNotification) -> AppResult<PendingNotification> {
        if let Some(existing) = self.find_by_key(pending.user_id, pending.kind).await? {
            let mut current = PendingNotification::try_from(existing)?;
            if current.is_failed() {
                current.rearm(pending.payload, pending.last_error, pending.next_attempt_at);
                self.store_attempt_state(&current, Some(&current.payload)).await?;
            }
            return Ok(current);
        }

        let active_model = ActiveModel {
            id: Set(pending.id),
            user_id: Set(pending.user_id),
            kind: Set(pending.kind.as_str().to_string()),
            payload: Set(pending.payload.clone()),
            attempts: Set(attempts_column(pending.attempts)),
            next_attempt_at: Set(pending.next_attempt_at),
            last_error: Set(pending.last_error.clone()),
            failed_at: Set(pending.failed_at),
            created_at: Set(pending.created_at),
        };

        let model = active_model.insert(&self.db).await?;
        PendingNotification::try_from(model)
    }

    async fn resolve(&self, user_id: UserId, kind: NotificationKind) -> AppResult<bool> {
        let result = OutboxEntity::delete_many()
            .filter(notification_outbox::Column::UserId.eq(user_id))
            .filter(notification_outbox::Column::Kind.eq(kind.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn due(&self, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<PendingNotification>> {
        let models = OutboxEntity::find()
            .filter(notification_outbox::Column::FailedAt.is_null())
            .filter(notification_outbox::Column::NextAttemptAt.lte(now))
            .order_by_asc(notification_outbox::Column::NextAttemptAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        models.into_iter().map(PendingNotification::try_from).collect()
    }

    async fn update(&self, pending: &PendingNotification) -> AppResult<()> {
        self.store_attempt_state(pending, None).await
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        OutboxEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }
}
