//! Persistence interface behind the submission and review managers
//!
//! Every read-decide-write sequence the lifecycle engine needs is exposed
//! here as one call, so each backend can run it inside its own
//! serialization boundary scoped to a single submission.

use crate::domain::{Review, ReviewCompletion, Submission, SubmissionStatus, UserRecord};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a compare-and-set on a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionUpdate {
    /// The expected status held and the change was written
    Applied(Submission),
    /// Another writer got there first; carries the current record
    StatusChanged(Submission),
    Missing,
}

/// A status change to apply with compare-and-set semantics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected: SubmissionStatus,
    pub next: SubmissionStatus,
    /// Replaces the stored editor comments when present
    pub editor_comments: Option<String>,
    pub at: DateTime<Utc>,
}

/// Outcome of inserting a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewInsert {
    Inserted {
        review: Review,
        submission: Submission,
        /// True when this insert moved the submission from submitted to under_review
        advanced: bool,
    },
    /// A review for this (submission, reviewer) pair already exists
    Duplicate(Review),
    /// The submission's status is not one the caller allowed
    StatusRejected(SubmissionStatus),
    SubmissionMissing,
}

/// Outcome of a guarded submission delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    HasReviews(usize),
    Missing,
}

#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Backend name for logs and readiness output
    fn backend(&self) -> &'static str;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    // Submissions

    async fn insert_submission(&self, submission: Submission) -> Result<Submission>;

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>>;

    /// Apply `change` only if the stored status still equals `change.expected`
    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<SubmissionUpdate>;

    /// Swap the manuscript only if the stored status still equals `expected`
    async fn replace_manuscript(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        reference: String,
        at: DateTime<Utc>,
    ) -> Result<SubmissionUpdate>;

    /// Delete a submission unless any review references it
    async fn delete_submission(&self, id: Uuid) -> Result<DeleteOutcome>;

    // Users

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn upsert_user(&self, user: UserRecord) -> Result<UserRecord>;

    // Reviews

    async fn find_review(&self, submission_id: Uuid, reviewer_id: Uuid)
        -> Result<Option<Review>>;

    async fn list_reviews(&self, submission_id: Uuid) -> Result<Vec<Review>>;

    /// Insert a review atomically with respect to its submission.
    ///
    /// In one serialization boundary: the submission must exist with a status
    /// in `allowed`, no review may exist for the (submission, reviewer) pair,
    /// and a submission still in `submitted` is moved to `under_review`.
    async fn insert_review(
        &self,
        review: Review,
        allowed: &[SubmissionStatus],
    ) -> Result<ReviewInsert>;

    /// Complete a pending review. Returns `None` when the review is missing
    /// or was already completed; stored values are never overwritten.
    async fn complete_review(
        &self,
        review_id: Uuid,
        completion: ReviewCompletion,
    ) -> Result<Option<Review>>;
}
