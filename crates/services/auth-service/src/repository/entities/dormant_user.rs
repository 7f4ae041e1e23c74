//! Dormant user entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::DormantUser;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dormant_users")]
pub struct Model {
    /// Copied from `users.id`, never generated here
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub dormant_date: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DormantUser {
    fn from(model: Model) -> Self {
        DormantUser {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
            dormant_date: model.dormant_date,
        }
    }
}
