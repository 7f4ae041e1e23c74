//! Active user repository.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use common::{AppError, AppResult};
use domain::{User, UserId};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Access to the active user table.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Whether an active user holds `username`
    async fn exists_by_username(&self, username: &str) -> AppResult<bool>;

    /// Find active user by username
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Find active user by ID
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    /// Insert a new active user; the store assigns the ID.
    ///
    /// Fails with `DuplicateUsername` when the unique constraint rejects it.
    async fn create(&self, username: String, password_hash: String) -> AppResult<User>;

    /// Remove an active user. Returns whether a row was deleted.
    async fn delete(&self, id: UserId) -> AppResult<bool>;
}

/// SeaORM implementation of [`UserRepository`].
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        let count = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(User::from))
    }

    async fn create(&self, username: String, password_hash: String) -> AppResult<User> {
        let active_model = ActiveModel {
            username: Set(username.clone()),
            password_hash: Set(password_hash),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| unique_violation_as_duplicate(e, &username))?;
        Ok(User::from(model))
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        let result = UserEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

/// The store's unique constraint is the last word on concurrent registrations.
pub(crate) fn unique_violation_as_duplicate(err: DbErr, username: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::duplicate_username(username),
        _ => AppError::from(err),
    }
}
