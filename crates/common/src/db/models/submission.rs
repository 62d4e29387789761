//! Submission entity

use crate::domain::{Submission, SubmissionStatus};
use crate::errors::AppError;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    /// Ordered keyword list as a JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: Json,

    pub author_id: Uuid,

    /// Ordered co-author names as a JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub co_authors: Json,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text")]
    pub manuscript_reference: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub editor_comments: Option<String>,

    pub submitted_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity", on_delete = "Restrict")]
    Reviews,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Submission {
    type Error = AppError;

    fn try_from(model: Model) -> std::result::Result<Self, AppError> {
        Ok(Submission {
            id: model.id,
            title: model.title,
            abstract_text: model.abstract_text,
            keywords: serde_json::from_value(model.keywords)?,
            author_id: model.author_id,
            co_authors: serde_json::from_value(model.co_authors)?,
            status: model.status.parse::<SubmissionStatus>()?,
            manuscript_reference: model.manuscript_reference,
            editor_comments: model.editor_comments,
            submitted_at: model.submitted_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

impl From<&Submission> for ActiveModel {
    fn from(submission: &Submission) -> Self {
        ActiveModel {
            id: Set(submission.id),
            title: Set(submission.title.clone()),
            abstract_text: Set(submission.abstract_text.clone()),
            keywords: Set(serde_json::json!(submission.keywords)),
            author_id: Set(submission.author_id),
            co_authors: Set(serde_json::json!(submission.co_authors)),
            status: Set(submission.status.as_str().to_string()),
            manuscript_reference: Set(submission.manuscript_reference.clone()),
            editor_comments: Set(submission.editor_comments.clone()),
            submitted_at: Set(submission.submitted_at.into()),
            updated_at: Set(submission.updated_at.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            title: "Sparse attention".to_string(),
            abstract_text: "We study sparse attention.".to_string(),
            keywords: serde_json::json!(["attention", "sparsity", "transformers"]),
            author_id: Uuid::new_v4(),
            co_authors: serde_json::json!(["A. Lovelace"]),
            status: status.to_string(),
            manuscript_reference: "sha256:abc".to_string(),
            editor_comments: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_converts_to_submission() {
        let model = row("under_review");
        let id = model.id;

        let submission = Submission::try_from(model).unwrap();
        assert_eq!(submission.id, id);
        assert_eq!(submission.status, SubmissionStatus::UnderReview);
        assert_eq!(submission.keywords.len(), 3);
        assert_eq!(submission.co_authors, vec!["A. Lovelace".to_string()]);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = Submission::try_from(row("archived")).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_active_model_keeps_status_string() {
        let submission = Submission::try_from(row("revisions_required")).unwrap();
        let active = ActiveModel::from(&submission);
        assert_eq!(active.status.as_ref(), "revisions_required");
    }
}
