//! Review entity

use crate::domain::{Recommendation, Review};
use crate::errors::AppError;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Unique together with `reviewer_id`
    pub submission_id: Uuid,

    pub reviewer_id: Uuid,

    pub assigned_by: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub recommendation: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    /// Null while the review is pending
    pub submitted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::submission::Entity",
        from = "Column::SubmissionId",
        to = "super::submission::Column::Id",
        on_delete = "Restrict"
    )]
    Submission,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Review {
    type Error = AppError;

    fn try_from(model: Model) -> std::result::Result<Self, AppError> {
        let recommendation = model
            .recommendation
            .as_deref()
            .map(str::parse::<Recommendation>)
            .transpose()?;

        Ok(Review {
            id: model.id,
            submission_id: model.submission_id,
            reviewer_id: model.reviewer_id,
            assigned_by: model.assigned_by,
            comments: model.comments,
            recommendation,
            created_at: model.created_at.with_timezone(&Utc),
            submitted_at: model.submitted_at.map(|at| at.with_timezone(&Utc)),
        })
    }
}

impl From<&Review> for ActiveModel {
    fn from(review: &Review) -> Self {
        ActiveModel {
            id: Set(review.id),
            submission_id: Set(review.submission_id),
            reviewer_id: Set(review.reviewer_id),
            assigned_by: Set(review.assigned_by),
            comments: Set(review.comments.clone()),
            recommendation: Set(review.recommendation.map(|r| r.as_str().to_string())),
            created_at: Set(review.created_at.into()),
            submitted_at: Set(review.submitted_at.map(Into::into)),
        }
    }
}
