//! Submission Entity Manager

use super::validation::{tidy, NewSubmission, NewUser};
use super::{rejected, JournalService};
use crate::auth::{Actor, Role, EDITORIAL_ROLES, REVIEWING_ROLES};
use crate::db::{DeleteOutcome, StatusChange, SubmissionUpdate};
use crate::domain::{Submission, SubmissionStatus, UserRecord};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// A concurrent writer can only move a submission along the transition
/// table, so a handful of re-reads always settles.
const MAX_STATUS_ATTEMPTS: usize = 4;

impl JournalService {
    /// Create a submission owned by the acting user, in `submitted`
    pub async fn create_submission(&self, actor: &Actor, input: NewSubmission) -> Result<Submission> {
        self.try_create_submission(actor, input)
            .await
            .map_err(|e| rejected("create_submission", e))
    }

    async fn try_create_submission(&self, actor: &Actor, input: NewSubmission) -> Result<Submission> {
        input.validate()?;

        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            abstract_text: input.abstract_text.trim().to_string(),
            keywords: tidy(&input.keywords),
            author_id: actor.id,
            co_authors: tidy(&input.co_authors),
            status: SubmissionStatus::Submitted,
            manuscript_reference: input.manuscript_reference.trim().to_string(),
            editor_comments: None,
            submitted_at: now,
            updated_at: now,
        };

        let submission = self.store.insert_submission(submission).await?;
        metrics::record_submission_created();

        info!(
            submission_id = %submission.id,
            author_id = %submission.author_id,
            keywords = submission.keywords.len(),
            "Submission created"
        );

        Ok(submission)
    }

    /// Authors see their own submissions; reviewing roles see any
    pub async fn get_submission(&self, actor: &Actor, id: Uuid) -> Result<Submission> {
        let submission = self
            .load_submission(id)
            .await
            .map_err(|e| rejected("get_submission", e))?;

        if !actor.has_any_role(REVIEWING_ROLES) {
            actor
                .require_identity(submission.author_id, "view this submission")
                .map_err(|e| rejected("get_submission", e))?;
        }

        Ok(submission)
    }

    /// Move a submission along the editorial state machine.
    ///
    /// Fails with `InvalidTransition` when `next` is not reachable from the
    /// current status; the submission is then left untouched.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        next: SubmissionStatus,
        comments: Option<String>,
    ) -> Result<Submission> {
        self.try_update_status(actor, id, next, comments)
            .await
            .map_err(|e| rejected("update_status", e))
    }

    async fn try_update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        next: SubmissionStatus,
        comments: Option<String>,
    ) -> Result<Submission> {
        actor.require_any_role(EDITORIAL_ROLES, "change submission status")?;

        let comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let mut current = self.load_submission(id).await?;

        for _ in 0..MAX_STATUS_ATTEMPTS {
            let from = current.status;
            if !from.can_transition_to(next) {
                return Err(AppError::InvalidTransition {
                    from: from.to_string(),
                    to: next.to_string(),
                });
            }

            if next == SubmissionStatus::RevisionsRequired && comments.is_none() {
                warn!(
                    submission_id = %id,
                    actor_id = %actor.id,
                    "Revisions requested without editor comments"
                );
            }

            let change = StatusChange {
                expected: from,
                next,
                editor_comments: comments.clone(),
                at: Utc::now(),
            };

            match self.store.update_status(id, change).await? {
                SubmissionUpdate::Applied(updated) => {
                    info!(
                        submission_id = %id,
                        actor_id = %actor.id,
                        from = %from,
                        to = %next,
                        "Submission status changed"
                    );
                    self.notify_status_changed(&updated, from, Some(actor.id));
                    return Ok(updated);
                }
                SubmissionUpdate::StatusChanged(latest) => {
                    // someone else moved it first; judge the request again
                    current = latest;
                }
                SubmissionUpdate::Missing => return Err(AppError::not_found("submission", id)),
            }
        }

        Err(AppError::InvalidState {
            message: format!("submission {} kept changing status; try again", id),
        })
    }

    /// Swap in a revised manuscript. Only the author may do this, and only
    /// while revisions are required; the status itself does not change.
    pub async fn replace_manuscript(
        &self,
        actor: &Actor,
        id: Uuid,
        reference: String,
    ) -> Result<Submission> {
        self.try_replace_manuscript(actor, id, reference)
            .await
            .map_err(|e| rejected("replace_manuscript", e))
    }

    async fn try_replace_manuscript(
        &self,
        actor: &Actor,
        id: Uuid,
        reference: String,
    ) -> Result<Submission> {
        let reference = reference.trim().to_string();
        if reference.is_empty() {
            return Err(AppError::Validation {
                message: "manuscript reference must not be blank".to_string(),
                field: Some("manuscript_reference".to_string()),
            });
        }

        let submission = self.load_submission(id).await?;
        actor.require_identity(submission.author_id, "replace the manuscript")?;

        let not_revisable = |status: SubmissionStatus| AppError::InvalidState {
            message: format!(
                "manuscript can only be replaced while revisions are required; status is {}",
                status
            ),
        };

        if submission.status != SubmissionStatus::RevisionsRequired {
            return Err(not_revisable(submission.status));
        }

        match self
            .store
            .replace_manuscript(id, SubmissionStatus::RevisionsRequired, reference, Utc::now())
            .await?
        {
            SubmissionUpdate::Applied(updated) => {
                info!(
                    submission_id = %id,
                    author_id = %actor.id,
                    manuscript_reference = %updated.manuscript_reference,
                    "Manuscript replaced"
                );
                Ok(updated)
            }
            SubmissionUpdate::StatusChanged(latest) => Err(not_revisable(latest.status)),
            SubmissionUpdate::Missing => Err(AppError::not_found("submission", id)),
        }
    }

    /// Remove a submission that no review references yet
    pub async fn delete_submission(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.try_delete_submission(actor, id)
            .await
            .map_err(|e| rejected("delete_submission", e))
    }

    async fn try_delete_submission(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require_any_role(&[Role::Admin], "delete submissions")?;

        match self.store.delete_submission(id).await? {
            DeleteOutcome::Deleted => {
                info!(submission_id = %id, actor_id = %actor.id, "Submission deleted");
                Ok(())
            }
            DeleteOutcome::HasReviews(count) => {
                warn!(submission_id = %id, reviews = count, "Deletion refused");
                Err(AppError::SubmissionHasReviews { id })
            }
            DeleteOutcome::Missing => Err(AppError::not_found("submission", id)),
        }
    }

    /// Add or update a user directory entry
    pub async fn register_user(&self, actor: &Actor, id: Uuid, input: NewUser) -> Result<UserRecord> {
        self.try_register_user(actor, id, input)
            .await
            .map_err(|e| rejected("register_user", e))
    }

    async fn try_register_user(&self, actor: &Actor, id: Uuid, input: NewUser) -> Result<UserRecord> {
        actor.require_any_role(&[Role::Admin], "register users")?;
        input.validate()?;

        let user = self
            .store
            .upsert_user(UserRecord {
                id,
                display_name: input.display_name.trim().to_string(),
                email: input.email,
                role: input.role,
                created_at: Utc::now(),
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }
}
