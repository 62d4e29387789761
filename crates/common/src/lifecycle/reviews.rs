//! Review Assignment Manager
//!
//! Two ways in: an editor assigns a reviewer, creating a pending review the
//! reviewer later completes; or a reviewer files a review directly, which
//! creates and completes it in one step. Completing a review never changes
//! the submission's status. Creating the first review on a `submitted`
//! submission moves it to `under_review`, once.

use super::validation::ReviewInput;
use super::{rejected, JournalService};
use crate::auth::{Actor, Role, EDITORIAL_ROLES, REVIEWING_ROLES};
use crate::db::ReviewInsert;
use crate::domain::{Review, ReviewCompletion, ReviewSummary, Submission, SubmissionStatus};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Reviewers may be assigned until a decision is final
const ASSIGNABLE: &[SubmissionStatus] = &[
    SubmissionStatus::Submitted,
    SubmissionStatus::UnderReview,
    SubmissionStatus::RevisionsRequired,
];

/// The uniqueness error a caller sees when a review for the pair already exists
fn already_filed(existing: &Review) -> AppError {
    if existing.was_assigned() {
        AppError::AlreadyCompleted {
            review_id: existing.id,
        }
    } else {
        AppError::AlreadyReviewed {
            submission_id: existing.submission_id,
            reviewer_id: existing.reviewer_id,
        }
    }
}

impl JournalService {
    /// Assign a reviewer to a submission, creating a pending review
    pub async fn assign_reviewer(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Review> {
        self.try_assign_reviewer(actor, submission_id, reviewer_id)
            .await
            .map_err(|e| rejected("assign_reviewer", e))
    }

    async fn try_assign_reviewer(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Review> {
        actor.require_any_role(EDITORIAL_ROLES, "assign reviewers")?;

        self.load_submission(submission_id).await?;
        let reviewer = self
            .store
            .find_user(reviewer_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", reviewer_id))?;

        if !REVIEWING_ROLES.contains(&reviewer.role) {
            return Err(AppError::InvalidRole {
                user_id: reviewer_id,
                role: reviewer.role.to_string(),
            });
        }

        let pending = Review::pending(submission_id, reviewer_id, actor.id);
        match self.store.insert_review(pending, ASSIGNABLE).await? {
            ReviewInsert::Inserted {
                review,
                submission,
                advanced,
            } => {
                metrics::record_review_assigned();
                info!(
                    submission_id = %submission_id,
                    reviewer_id = %reviewer_id,
                    review_id = %review.id,
                    actor_id = %actor.id,
                    "Reviewer assigned"
                );
                if advanced {
                    info!(
                        submission_id = %submission_id,
                        from = %SubmissionStatus::Submitted,
                        to = %submission.status,
                        "Submission entered review"
                    );
                    self.notify_status_changed(&submission, SubmissionStatus::Submitted, Some(actor.id));
                }
                self.notify_assigned(&review, &submission);
                Ok(review)
            }
            ReviewInsert::Duplicate(_) => Err(AppError::AlreadyAssigned {
                submission_id,
                reviewer_id,
            }),
            ReviewInsert::StatusRejected(status) => Err(AppError::InvalidState {
                message: format!("cannot assign reviewers to a {} submission", status),
            }),
            ReviewInsert::SubmissionMissing => Err(AppError::not_found("submission", submission_id)),
        }
    }

    /// File a review for `reviewer_id` on a submission.
    ///
    /// Completes the pending review if one was assigned; otherwise creates
    /// and completes one directly, which requires the submission to still be
    /// `submitted` or `under_review`. Reviews are write-once either way.
    pub async fn submit_review(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        reviewer_id: Uuid,
        input: ReviewInput,
    ) -> Result<Review> {
        self.try_submit_review(actor, submission_id, reviewer_id, input)
            .await
            .map_err(|e| rejected("submit_review", e))
    }

    async fn try_submit_review(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        reviewer_id: Uuid,
        input: ReviewInput,
    ) -> Result<Review> {
        actor.require_any_role(REVIEWING_ROLES, "submit reviews")?;
        if actor.role != Role::Admin {
            actor.require_identity(reviewer_id, "submit this review")?;
        }
        input.validate()?;

        let submission = self.load_submission(submission_id).await?;
        let completion = ReviewCompletion {
            comments: input.comments.trim().to_string(),
            recommendation: input.recommendation,
            submitted_at: Utc::now(),
        };

        match self.store.find_review(submission_id, reviewer_id).await? {
            Some(existing) if existing.is_completed() => Err(already_filed(&existing)),
            Some(pending) => self.complete_pending(&submission, pending, completion).await,
            None => self.file_direct(&submission, reviewer_id, completion).await,
        }
    }

    async fn complete_pending(
        &self,
        submission: &Submission,
        pending: Review,
        completion: ReviewCompletion,
    ) -> Result<Review> {
        let Some(review) = self.store.complete_review(pending.id, completion).await? else {
            // lost the race to another completion
            return Err(AppError::AlreadyCompleted {
                review_id: pending.id,
            });
        };

        metrics::record_review_completed("assigned");
        info!(
            submission_id = %submission.id,
            reviewer_id = %review.reviewer_id,
            review_id = %review.id,
            recommendation = ?review.recommendation,
            "Assigned review completed"
        );
        self.notify_completed(&review, submission);
        Ok(review)
    }

    async fn file_direct(
        &self,
        submission: &Submission,
        reviewer_id: Uuid,
        completion: ReviewCompletion,
    ) -> Result<Review> {
        let review = Review::direct(submission.id, reviewer_id, &completion);

        match self
            .store
            .insert_review(review, &SubmissionStatus::REVIEWABLE)
            .await?
        {
            ReviewInsert::Inserted {
                review,
                submission,
                advanced,
            } => {
                metrics::record_review_completed("direct");
                info!(
                    submission_id = %submission.id,
                    reviewer_id = %reviewer_id,
                    review_id = %review.id,
                    recommendation = ?review.recommendation,
                    "Direct review filed"
                );
                if advanced {
                    self.notify_status_changed(&submission, SubmissionStatus::Submitted, None);
                }
                self.notify_completed(&review, &submission);
                Ok(review)
            }
            // an assignment landed between our lookup and the insert
            ReviewInsert::Duplicate(existing) if !existing.is_completed() => {
                self.complete_pending(submission, existing, completion).await
            }
            ReviewInsert::Duplicate(existing) => Err(already_filed(&existing)),
            ReviewInsert::StatusRejected(status) => Err(AppError::InvalidSubmissionState {
                status: status.to_string(),
            }),
            ReviewInsert::SubmissionMissing => {
                Err(AppError::not_found("submission", submission.id))
            }
        }
    }

    /// Aggregate the completed reviews of a submission
    pub async fn get_review_summary(&self, actor: &Actor, submission_id: Uuid) -> Result<ReviewSummary> {
        let submission = self
            .load_submission(submission_id)
            .await
            .map_err(|e| rejected("get_review_summary", e))?;

        if !actor.has_any_role(REVIEWING_ROLES) {
            actor
                .require_identity(submission.author_id, "view this review summary")
                .map_err(|e| rejected("get_review_summary", e))?;
        }

        let reviews = self
            .store
            .list_reviews(submission_id)
            .await
            .map_err(|e| rejected("get_review_summary", e))?;
        Ok(ReviewSummary::from_reviews(submission_id, &reviews))
    }

    /// Reviews of a submission the actor is allowed to read.
    ///
    /// Editors and admins see all of them, a reviewer sees their own, and
    /// the author sees the completed ones.
    pub async fn list_reviews(&self, actor: &Actor, submission_id: Uuid) -> Result<Vec<Review>> {
        let submission = self
            .load_submission(submission_id)
            .await
            .map_err(|e| rejected("list_reviews", e))?;
        let reviews = self
            .store
            .list_reviews(submission_id)
            .await
            .map_err(|e| rejected("list_reviews", e))?;

        if actor.has_any_role(EDITORIAL_ROLES) {
            return Ok(reviews);
        }
        if submission.is_authored_by(actor.id) {
            return Ok(reviews.into_iter().filter(Review::is_completed).collect());
        }
        if actor.role == Role::Reviewer {
            return Ok(reviews
                .into_iter()
                .filter(|r| r.reviewer_id == actor.id)
                .collect());
        }

        Err(rejected(
            "list_reviews",
            AppError::forbidden("only editors, reviewers, and the author may list reviews"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::{Actor, Role};
    use crate::domain::{Recommendation, SubmissionStatus};
    use crate::errors::AppError;
    use futures::future::join_all;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_assign_checks_in_order() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;

        // role
        assert!(matches!(
            fx.service
                .assign_reviewer(&reviewer, submission.id, reviewer.id)
                .await,
            Err(AppError::Forbidden { .. })
        ));
        // existence of submission and reviewer
        assert!(matches!(
            fx.service
                .assign_reviewer(&fx.editor, Uuid::new_v4(), reviewer.id)
                .await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            fx.service
                .assign_reviewer(&fx.editor, submission.id, Uuid::new_v4())
                .await,
            Err(AppError::NotFound { .. })
        ));
        // eligibility
        assert!(matches!(
            fx.service
                .assign_reviewer(&fx.editor, submission.id, fx.author.id)
                .await,
            Err(AppError::InvalidRole { .. })
        ));
        // editors may review too
        assert!(fx
            .service
            .assign_reviewer(&fx.admin, submission.id, fx.editor.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_assignment_refused() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;

        fx.service
            .assign_reviewer(&fx.editor, submission.id, reviewer.id)
            .await
            .unwrap();
        let again = fx
            .service
            .assign_reviewer(&fx.admin, submission.id, reviewer.id)
            .await;
        assert!(matches!(again, Err(AppError::AlreadyAssigned { .. })));

        let reviews = fx.service.list_reviews(&fx.editor, submission.id).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_submitted_advances_exactly_once() {
        let fx = Fixture::new().await;
        let submission = fx.submission().await;

        let mut stamps = Vec::new();
        for _ in 0..3 {
            let reviewer = fx.reviewer().await;
            fx.service
                .assign_reviewer(&fx.editor, submission.id, reviewer.id)
                .await
                .unwrap();
            let current = fx.service.get_submission(&fx.editor, submission.id).await.unwrap();
            assert_eq!(current.status, SubmissionStatus::UnderReview);
            stamps.push(current.updated_at);
        }
        // later assignments leave the submission alone
        assert_eq!(stamps[1], stamps[0]);
        assert_eq!(stamps[2], stamps[0]);
    }

    #[tokio::test]
    async fn test_no_assignment_after_decision() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;
        for status in [SubmissionStatus::UnderReview, SubmissionStatus::Rejected] {
            fx.service
                .update_status(&fx.editor, submission.id, status, None)
                .await
                .unwrap();
        }

        let result = fx
            .service
            .assign_reviewer(&fx.editor, submission.id, reviewer.id)
            .await;
        assert!(matches!(result, Err(AppError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_assigned_review_is_write_once() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;
        fx.service
            .assign_reviewer(&fx.editor, submission.id, reviewer.id)
            .await
            .unwrap();

        let first = fx
            .service
            .submit_review(
                &reviewer,
                submission.id,
                reviewer.id,
                review_input(Recommendation::Accept),
            )
            .await
            .unwrap();

        let second = fx
            .service
            .submit_review(
                &reviewer,
                submission.id,
                reviewer.id,
                review_input(Recommendation::Reject),
            )
            .await;
        assert!(matches!(second, Err(AppError::AlreadyCompleted { review_id }) if review_id == first.id));

        let stored = fx.service.list_reviews(&fx.editor, submission.id).await.unwrap();
        assert_eq!(stored, vec![first]);
    }

    #[tokio::test]
    async fn test_reviewers_file_only_their_own_reviews() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let other = fx.reviewer().await;
        let submission = fx.submission().await;

        let result = fx
            .service
            .submit_review(
                &other,
                submission.id,
                reviewer.id,
                review_input(Recommendation::Accept),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));

        let result = fx
            .service
            .submit_review(
                &fx.author,
                submission.id,
                fx.author.id,
                review_input(Recommendation::Accept),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_direct_review_needs_reviewable_status() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;
        for status in [
            SubmissionStatus::UnderReview,
            SubmissionStatus::RevisionsRequired,
        ] {
            fx.service
                .update_status(&fx.editor, submission.id, status, Some("redo".to_string()))
                .await
                .unwrap();
        }

        let result = fx
            .service
            .submit_review(
                &reviewer,
                submission.id,
                reviewer.id,
                review_input(Recommendation::Accept),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidSubmissionState { .. })));
    }

    #[tokio::test]
    async fn test_direct_path_completes_pending_review() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;
        let pending = fx
            .service
            .assign_reviewer(&fx.editor, submission.id, reviewer.id)
            .await
            .unwrap();

        let review = fx
            .service
            .submit_review(
                &reviewer,
                submission.id,
                reviewer.id,
                review_input(Recommendation::MajorRevisions),
            )
            .await
            .unwrap();
        assert_eq!(review.id, pending.id);
        assert_eq!(review.assigned_by, Some(fx.editor.id));

        let reviews = fx.service.list_reviews(&fx.editor, submission.id).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission = fx.submission().await;
        fx.service
            .assign_reviewer(&fx.editor, submission.id, reviewer.id)
            .await
            .unwrap();

        let summary = fx
            .service
            .get_review_summary(&fx.author, submission.id)
            .await
            .unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.recommendations.values().all(|&n| n == 0));
    }

    #[tokio::test]
    async fn test_list_reviews_visibility() {
        let fx = Fixture::new().await;
        let assigned = fx.reviewer().await;
        let direct = fx.reviewer().await;
        let submission = fx.submission().await;

        fx.service
            .assign_reviewer(&fx.editor, submission.id, assigned.id)
            .await
            .unwrap();
        fx.service
            .submit_review(
                &direct,
                submission.id,
                direct.id,
                review_input(Recommendation::Accept),
            )
            .await
            .unwrap();

        let all = fx.service.list_reviews(&fx.editor, submission.id).await.unwrap();
        assert_eq!(all.len(), 2);

        let own = fx.service.list_reviews(&assigned, submission.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].reviewer_id, assigned.id);

        let for_author = fx.service.list_reviews(&fx.author, submission.id).await.unwrap();
        assert_eq!(for_author.len(), 1);
        assert!(for_author[0].is_completed());

        let stranger = Actor::new(Uuid::new_v4(), Role::Author);
        assert!(matches!(
            fx.service.list_reviews(&stranger, submission.id).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_assignments_yield_one_review() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission_id = fx.submission().await.id;

        let attempts = (0..16).map(|i| {
            let service = fx.service.clone();
            let editor = if i % 2 == 0 { fx.editor } else { fx.admin };
            tokio::spawn(async move {
                service
                    .assign_reviewer(&editor, submission_id, reviewer.id)
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::AlreadyAssigned { .. })));

        let reviews = fx.service.list_reviews(&fx.editor, submission_id).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_are_write_once() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission_id = fx.submission().await.id;
        fx.service
            .assign_reviewer(&fx.editor, submission_id, reviewer.id)
            .await
            .unwrap();

        let attempts = Recommendation::ALL.into_iter().cycle().take(12).map(|recommendation| {
            let service = fx.service.clone();
            tokio::spawn(async move {
                service
                    .submit_review(
                        &reviewer,
                        submission_id,
                        reviewer.id,
                        review_input(recommendation),
                    )
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::AlreadyCompleted { .. })));

        let stored = fx.service.list_reviews(&fx.editor, submission_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].recommendation, winners[0].recommendation);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_direct_reviews_yield_one_review() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;
        let submission_id = fx.submission().await.id;

        let attempts = (0..12).map(|_| {
            let service = fx.service.clone();
            tokio::spawn(async move {
                service
                    .submit_review(
                        &reviewer,
                        submission_id,
                        reviewer.id,
                        review_input(Recommendation::MinorRevisions),
                    )
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::AlreadyReviewed { .. })));

        let current = fx.service.get_submission(&fx.editor, submission_id).await.unwrap();
        assert_eq!(current.status, SubmissionStatus::UnderReview);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_assignment_racing_direct_review_leaves_one_completed_review() {
        let fx = Fixture::new().await;
        let reviewer = fx.reviewer().await;

        for _ in 0..16 {
            let submission_id = fx.submission().await.id;

            let assign = {
                let service = fx.service.clone();
                let editor = fx.editor;
                tokio::spawn(async move {
                    service
                        .assign_reviewer(&editor, submission_id, reviewer.id)
                        .await
                })
            };
            let direct = {
                let service = fx.service.clone();
                tokio::spawn(async move {
                    service
                        .submit_review(
                            &reviewer,
                            submission_id,
                            reviewer.id,
                            review_input(Recommendation::Accept),
                        )
                        .await
                })
            };
            let (assigned, filed) = tokio::join!(assign, direct);

            // the review is filed whichever way the race goes
            let filed = filed.unwrap().unwrap();
            assert!(matches!(
                assigned.unwrap(),
                Ok(_) | Err(AppError::AlreadyAssigned { .. })
            ));

            let reviews = fx.service.list_reviews(&fx.editor, submission_id).await.unwrap();
            assert_eq!(reviews.len(), 1);
            assert_eq!(reviews[0].id, filed.id);
            assert!(reviews[0].is_completed());
            assert_eq!(reviews[0].recommendation, Some(Recommendation::Accept));
        }
    }
}
