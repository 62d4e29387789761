//! PostgreSQL implementation of `JournalStore`
//!
//! Every read-decide-write call runs in a transaction that first takes a
//! row lock on the affected submission (`SELECT ... FOR UPDATE`). The
//! `(submission_id, reviewer_id)` unique constraint backs up the duplicate
//! check should anything bypass that lock.

use crate::db::models::*;
use crate::db::store::{DeleteOutcome, JournalStore, ReviewInsert, StatusChange, SubmissionUpdate};
use crate::db::DbPool;
use crate::domain::{Review, ReviewCompletion, Submission, SubmissionStatus, UserRecord};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

/// Journal store backed by PostgreSQL
#[derive(Clone)]
pub struct PgJournalStore {
    pool: DbPool,
}

impl PgJournalStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    /// Lock a submission row for the rest of the transaction
    async fn lock_submission(
        txn: &DatabaseTransaction,
        id: Uuid,
    ) -> Result<Option<SubmissionRow>> {
        SubmissionEntity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(Into::into)
    }

    async fn find_review_on<C: ConnectionTrait>(
        conn: &C,
        submission_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Option<Review>> {
        ReviewEntity::find()
            .filter(ReviewColumn::SubmissionId.eq(submission_id))
            .filter(ReviewColumn::ReviewerId.eq(reviewer_id))
            .one(conn)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    /// Run a compare-and-set against the submission's status
    async fn compare_and_set<F>(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        apply: F,
    ) -> Result<SubmissionUpdate>
    where
        F: FnOnce(&mut SubmissionActiveModel) + Send,
    {
        let txn = self.conn().begin().await?;

        let Some(row) = Self::lock_submission(&txn, id).await? else {
            txn.rollback().await?;
            return Ok(SubmissionUpdate::Missing);
        };

        let current = Submission::try_from(row.clone())?;
        if current.status != expected {
            txn.rollback().await?;
            return Ok(SubmissionUpdate::StatusChanged(current));
        }

        let mut active: SubmissionActiveModel = row.into();
        apply(&mut active);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(SubmissionUpdate::Applied(Submission::try_from(updated)?))
    }
}

#[async_trait]
impl JournalStore for PgJournalStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Submission Operations
    // ========================================================================

    async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
        let row = SubmissionActiveModel::from(&submission)
            .insert(self.conn())
            .await?;
        Submission::try_from(row)
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        SubmissionEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Submission::try_from)
            .transpose()
    }

    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<SubmissionUpdate> {
        let StatusChange {
            expected,
            next,
            editor_comments,
            at,
        } = change;

        self.compare_and_set(id, expected, move |active| {
            active.status = Set(next.as_str().to_string());
            if let Some(comments) = editor_comments {
                active.editor_comments = Set(Some(comments));
            }
            active.updated_at = Set(at.into());
        })
        .await
    }

    async fn replace_manuscript(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        reference: String,
        at: DateTime<Utc>,
    ) -> Result<SubmissionUpdate> {
        self.compare_and_set(id, expected, move |active| {
            active.manuscript_reference = Set(reference);
            active.updated_at = Set(at.into());
        })
        .await
    }

    async fn delete_submission(&self, id: Uuid) -> Result<DeleteOutcome> {
        let txn = self.conn().begin().await?;

        if Self::lock_submission(&txn, id).await?.is_none() {
            txn.rollback().await?;
            return Ok(DeleteOutcome::Missing);
        }

        let reviews = ReviewEntity::find()
            .filter(ReviewColumn::SubmissionId.eq(id))
            .count(&txn)
            .await?;
        if reviews > 0 {
            txn.rollback().await?;
            return Ok(DeleteOutcome::HasReviews(reviews as usize));
        }

        SubmissionEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<UserRecord> {
        UserEntity::insert(UserActiveModel::from(&user))
            .on_conflict(
                OnConflict::column(UserColumn::Id)
                    .update_columns([UserColumn::DisplayName, UserColumn::Email, UserColumn::Role])
                    .to_owned(),
            )
            .exec(self.conn())
            .await?;

        let row = UserEntity::find_by_id(user.id)
            .one(self.conn())
            .await?
            .ok_or_else(|| crate::errors::AppError::not_found("user", user.id))?;
        UserRecord::try_from(row)
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    async fn find_review(
        &self,
        submission_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Option<Review>> {
        Self::find_review_on(self.conn(), submission_id, reviewer_id).await
    }

    async fn list_reviews(&self, submission_id: Uuid) -> Result<Vec<Review>> {
        ReviewEntity::find()
            .filter(ReviewColumn::SubmissionId.eq(submission_id))
            .order_by_asc(ReviewColumn::CreatedAt)
            .all(self.conn())
            .await?
            .into_iter()
            .map(Review::try_from)
            .collect()
    }

    async fn insert_review(
        &self,
        review: Review,
        allowed: &[SubmissionStatus],
    ) -> Result<ReviewInsert> {
        let txn = self.conn().begin().await?;

        let Some(row) = Self::lock_submission(&txn, review.submission_id).await? else {
            txn.rollback().await?;
            return Ok(ReviewInsert::SubmissionMissing);
        };
        let submission = Submission::try_from(row.clone())?;

        if let Some(existing) =
            Self::find_review_on(&txn, review.submission_id, review.reviewer_id).await?
        {
            txn.rollback().await?;
            return Ok(ReviewInsert::Duplicate(existing));
        }

        if !allowed.contains(&submission.status) {
            txn.rollback().await?;
            return Ok(ReviewInsert::StatusRejected(submission.status));
        }

        if let Err(err) = ReviewActiveModel::from(&review).insert(&txn).await {
            txn.rollback().await?;
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                debug!(
                    submission_id = %review.submission_id,
                    reviewer_id = %review.reviewer_id,
                    "Unique constraint caught a duplicate review"
                );
                if let Some(existing) =
                    Self::find_review_on(self.conn(), review.submission_id, review.reviewer_id)
                        .await?
                {
                    return Ok(ReviewInsert::Duplicate(existing));
                }
            }
            return Err(err.into());
        }

        let advanced = submission.status == SubmissionStatus::Submitted;
        let submission = if advanced {
            let mut active: SubmissionActiveModel = row.into();
            active.status = Set(SubmissionStatus::UnderReview.as_str().to_string());
            active.updated_at = Set(Utc::now().into());
            Submission::try_from(active.update(&txn).await?)?
        } else {
            submission
        };

        txn.commit().await?;

        Ok(ReviewInsert::Inserted {
            review,
            submission,
            advanced,
        })
    }

    async fn complete_review(
        &self,
        review_id: Uuid,
        completion: ReviewCompletion,
    ) -> Result<Option<Review>> {
        let submitted_at: sea_orm::prelude::DateTimeWithTimeZone = completion.submitted_at.into();

        let result = ReviewEntity::update_many()
            .col_expr(ReviewColumn::Comments, Expr::value(Some(completion.comments)))
            .col_expr(
                ReviewColumn::Recommendation,
                Expr::value(Some(completion.recommendation.as_str().to_string())),
            )
            .col_expr(ReviewColumn::SubmittedAt, Expr::value(Some(submitted_at)))
            .filter(ReviewColumn::Id.eq(review_id))
            .filter(ReviewColumn::SubmittedAt.is_null())
            .exec(self.conn())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        ReviewEntity::find_by_id(review_id)
            .one(self.conn())
            .await?
            .map(Review::try_from)
            .transpose()
    }
}
