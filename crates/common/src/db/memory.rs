//! In-memory implementation of `JournalStore`.
//!
//! All state is held in memory and lost on restart. Each submission lives in
//! its own mutex-guarded slot together with its reviews, so writers on one
//! submission are serialized while different submissions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::store::{DeleteOutcome, JournalStore, ReviewInsert, StatusChange, SubmissionUpdate};
use crate::domain::{Review, ReviewCompletion, Submission, SubmissionStatus, UserRecord};
use crate::errors::{AppError, Result};

/// A submission and every review that references it.
#[derive(Debug)]
struct SubmissionSlot {
    submission: Submission,
    reviews: Vec<Review>,
    /// Set by delete so that callers holding a stale handle see the record as gone.
    deleted: bool,
}

type Slot = Arc<Mutex<SubmissionSlot>>;

/// In-memory journal store.
pub struct InMemoryJournalStore {
    submissions: RwLock<HashMap<Uuid, Slot>>,
    /// Review id to owning submission id.
    review_index: RwLock<HashMap<Uuid, Uuid>>,
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self {
            submissions: RwLock::new(HashMap::new()),
            review_index: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, id: Uuid) -> Option<Slot> {
        self.submissions.read().await.get(&id).cloned()
    }
}

impl Default for InMemoryJournalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&submission.id) {
            return Err(AppError::Internal {
                message: format!("Submission id {} already in use", submission.id),
            });
        }
        let slot = SubmissionSlot {
            submission: submission.clone(),
            reviews: Vec::new(),
            deleted: false,
        };
        submissions.insert(submission.id, Arc::new(Mutex::new(slot)));
        Ok(submission)
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        let Some(slot) = self.slot(id).await else {
            return Ok(None);
        };
        let slot = slot.lock().await;
        Ok((!slot.deleted).then(|| slot.submission.clone()))
    }

    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<SubmissionUpdate> {
        let Some(slot) = self.slot(id).await else {
            return Ok(SubmissionUpdate::Missing);
        };
        let mut slot = slot.lock().await;
        if slot.deleted {
            return Ok(SubmissionUpdate::Missing);
        }
        if slot.submission.status != change.expected {
            return Ok(SubmissionUpdate::StatusChanged(slot.submission.clone()));
        }

        slot.submission.status = change.next;
        if let Some(comments) = change.editor_comments {
            slot.submission.editor_comments = Some(comments);
        }
        slot.submission.updated_at = change.at;
        Ok(SubmissionUpdate::Applied(slot.submission.clone()))
    }

    async fn replace_manuscript(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        reference: String,
        at: DateTime<Utc>,
    ) -> Result<SubmissionUpdate> {
        let Some(slot) = self.slot(id).await else {
            return Ok(SubmissionUpdate::Missing);
        };
        let mut slot = slot.lock().await;
        if slot.deleted {
            return Ok(SubmissionUpdate::Missing);
        }
        if slot.submission.status != expected {
            return Ok(SubmissionUpdate::StatusChanged(slot.submission.clone()));
        }

        slot.submission.manuscript_reference = reference;
        slot.submission.updated_at = at;
        Ok(SubmissionUpdate::Applied(slot.submission.clone()))
    }

    async fn delete_submission(&self, id: Uuid) -> Result<DeleteOutcome> {
        let mut submissions = self.submissions.write().await;
        let Some(slot) = submissions.get(&id).cloned() else {
            return Ok(DeleteOutcome::Missing);
        };
        let mut slot = slot.lock().await;
        if !slot.reviews.is_empty() {
            return Ok(DeleteOutcome::HasReviews(slot.reviews.len()));
        }
        slot.deleted = true;
        submissions.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<UserRecord> {
        let mut users = self.users.write().await;
        let stored = match users.get(&user.id) {
            // keep the original registration time
            Some(existing) => UserRecord {
                created_at: existing.created_at,
                ..user
            },
            None => user,
        };
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_review(
        &self,
        submission_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Option<Review>> {
        let Some(slot) = self.slot(submission_id).await else {
            return Ok(None);
        };
        let slot = slot.lock().await;
        Ok(slot
            .reviews
            .iter()
            .find(|r| r.reviewer_id == reviewer_id)
            .cloned())
    }

    async fn list_reviews(&self, submission_id: Uuid) -> Result<Vec<Review>> {
        let Some(slot) = self.slot(submission_id).await else {
            return Ok(Vec::new());
        };
        let slot = slot.lock().await;
        Ok(slot.reviews.clone())
    }

    async fn insert_review(
        &self,
        review: Review,
        allowed: &[SubmissionStatus],
    ) -> Result<ReviewInsert> {
        let Some(slot) = self.slot(review.submission_id).await else {
            return Ok(ReviewInsert::SubmissionMissing);
        };
        let mut slot = slot.lock().await;
        if slot.deleted {
            return Ok(ReviewInsert::SubmissionMissing);
        }
        if let Some(existing) = slot
            .reviews
            .iter()
            .find(|r| r.reviewer_id == review.reviewer_id)
        {
            return Ok(ReviewInsert::Duplicate(existing.clone()));
        }
        if !allowed.contains(&slot.submission.status) {
            return Ok(ReviewInsert::StatusRejected(slot.submission.status));
        }

        let advanced = slot.submission.status == SubmissionStatus::Submitted;
        if advanced {
            slot.submission.status = SubmissionStatus::UnderReview;
            slot.submission.updated_at = Utc::now();
        }

        slot.reviews.push(review.clone());
        self.review_index
            .write()
            .await
            .insert(review.id, review.submission_id);

        Ok(ReviewInsert::Inserted {
            review,
            submission: slot.submission.clone(),
            advanced,
        })
    }

    async fn complete_review(
        &self,
        review_id: Uuid,
        completion: ReviewCompletion,
    ) -> Result<Option<Review>> {
        let submission_id = match self.review_index.read().await.get(&review_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        let Some(slot) = self.slot(submission_id).await else {
            return Ok(None);
        };
        let mut slot = slot.lock().await;
        let Some(review) = slot.reviews.iter_mut().find(|r| r.id == review_id) else {
            return Ok(None);
        };
        if review.is_completed() {
            return Ok(None);
        }

        review.comments = Some(completion.comments);
        review.recommendation = Some(completion.recommendation);
        review.submitted_at = Some(completion.submitted_at);
        Ok(Some(review.clone()))
    }
}
