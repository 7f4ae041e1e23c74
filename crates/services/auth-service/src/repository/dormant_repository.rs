//! Dormant account repository.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use super::entities::dormant_user::{self, ActiveModel, Entity as DormantEntity};
use super::user_repository::unique_violation_as_duplicate;
use common::AppResult;
use domain::{DormantUser, UserId};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Access to the dormant account table.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait DormantRepository: Send + Sync {
    /// Whether a dormant account holds `username`
    async fn exists_by_username(&self, username: &str) -> AppResult<bool>;

    /// Find dormant account by ID
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<DormantUser>>;

    /// Persist a dormant account.
    ///
    /// Idempotent by ID: if the account is already dormant, the stored record
    /// (with its original dormancy date) is returned unchanged.
    async fn save(&self, dormant: &DormantUser) -> AppResult<DormantUser>;

    /// Dormant accounts whose dormancy date is strictly before `cutoff`
    async fn find_dormant_before(&self, cutoff: NaiveDate) -> AppResult<Vec<DormantUser>>;

    /// Remove a dormant account. Returns whether a row was deleted.
    async fn delete(&self, id: UserId) -> AppResult<bool>;
}

/// SeaORM implementation of [`DormantRepository`].
pub struct DormantStore {
    db: DatabaseConnection,
}

impl DormantStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DormantRepository for DormantStore {
    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        let count = DormantEntity::find()
            .filter(dormant_user::Column::Username.eq(username))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<DormantUser>> {
        let result = DormantEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(DormantUser::from))
    }

    async fn save(&self, dormant: &DormantUser) -> AppResult<DormantUser> {
        if let Some(existing) = DormantEntity::find_by_id(dormant.id).one(&self.db).await? {
            return Ok(DormantUser::from(existing));
        }

        let active_model = ActiveModel {
            id: Set(dormant.id),
            username: Set(dormant.username.clone()),
            password_hash: Set(dormant.password_hash.clone()),
            dormant_date: Set(dormant.dormant_date),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| unique_violation_as_duplicate(e, &dormant.username))?;
        Ok(DormantUser::from(model))
    }

    async fn find_dormant_before(&self, cutoff: NaiveDate) -> AppResult<Vec<DormantUser>> {
        let models = DormantEntity::find()
            .filter(dormant_user::Column::DormantDate.lt(cutoff))
            .order_by_asc(dormant_user::Column::DormantDate)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(DormantUser::from).collect())
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        let result = DormantEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
