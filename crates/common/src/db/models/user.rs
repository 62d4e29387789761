//! User directory entity

use crate::auth::Role;
use crate::domain::UserRecord;
use crate::errors::AppError;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub display_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for UserRecord {
    type Error = AppError;

    fn try_from(model: Model) -> std::result::Result<Self, AppError> {
        Ok(UserRecord {
            id: model.id,
            display_name: model.display_name,
            email: model.email,
            role: model.role.parse::<Role>()?,
            created_at: model.created_at.with_timezone(&Utc),
        })
    }
}

impl From<&UserRecord> for ActiveModel {
    fn from(user: &UserRecord) -> Self {
        ActiveModel {
            id: Set(user.id),
            display_name: Set(user.display_name.clone()),
            email: Set(user.email.clone()),
            role: Set(user.role.as_str().to_string()),
            created_at: Set(user.created_at.into()),
        }
    }
}
