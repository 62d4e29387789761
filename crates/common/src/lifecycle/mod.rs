//! Submission lifecycle and peer-review assignment engine
//!
//! `JournalService` is the public operation surface. Every operation takes
//! the acting `Actor` explicitly, checks role, then existence, then state,
//! and hands the read-decide-write part to the `JournalStore`, which
//! serializes it per submission. Notifications go out after the write has
//! landed and never affect the result.

mod reviews;
mod submissions;
pub mod validation;

pub use validation::{NewSubmission, NewUser, ReviewInput};

use crate::db::JournalStore;
use crate::domain::{Review, Submission, SubmissionStatus};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::notifications::{Dispatcher, NotificationEvent};
use std::sync::Arc;
use tracing::debug;

/// The submission and review managers over one store
#[derive(Clone)]
pub struct JournalService {
    store: Arc<dyn JournalStore>,
    notifier: Dispatcher,
}

impl JournalService {
    pub fn new(store: Arc<dyn JournalStore>, notifier: Dispatcher) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn JournalStore> {
        &self.store
    }

    async fn load_submission(&self, id: uuid::Uuid) -> Result<Submission> {
        self.store
            .find_submission(id)
            .await?
            .ok_or_else(|| AppError::not_found("submission", id))
    }

    fn notify_status_changed(
        &self,
        submission: &Submission,
        from: SubmissionStatus,
        actor_id: Option<uuid::Uuid>,
    ) {
        metrics::record_transition(from.as_str(), submission.status.as_str());
        self.notifier.notify(
            NotificationEvent::StatusChanged,
            submission.author_id,
            serde_json::json!({
                "submission_id": submission.id,
                "title": submission.title,
                "from": from,
                "to": submission.status,
                "editor_comments": submission.editor_comments,
                "changed_by": actor_id,
            }),
        );
    }

    fn notify_assigned(&self, review: &Review, submission: &Submission) {
        self.notifier.notify(
            NotificationEvent::Assigned,
            review.reviewer_id,
            serde_json::json!({
                "submission_id": submission.id,
                "review_id": review.id,
                "title": submission.title,
                "assigned_by": review.assigned_by,
            }),
        );
    }

    fn notify_completed(&self, review: &Review, submission: &Submission) {
        // assigned reviews report back to the assigning editor
        let recipient = review.assigned_by.unwrap_or(submission.author_id);
        self.notifier.notify(
            NotificationEvent::Completed,
            recipient,
            serde_json::json!({
                "submission_id": submission.id,
                "review_id": review.id,
                "reviewer_id": review.reviewer_id,
                "recommendation": review.recommendation,
            }),
        );
    }
}

/// Log and count a refused operation before handing the error back
fn rejected(operation: &'static str, err: AppError) -> AppError {
    let code = err.code();
    debug!(
        operation,
        code = ?code,
        precondition = ?err.precondition(),
        error = %err,
        "Operation refused"
    );
    metrics::record_rejection(operation, code);
    err
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::{Actor, Role};
    use crate::db::InMemoryJournalStore;
    use crate::domain::UserRecord;
    use crate::notifications::RecordingSink;
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    pub struct Fixture {
        pub service: JournalService,
        pub sink: Arc<RecordingSink>,
        pub author: Actor,
        pub editor: Actor,
        pub admin: Actor,
    }

    impl Fixture {
        pub async fn new() -> Self {
            let sink = Arc::new(RecordingSink::new());
            let dispatcher = Dispatcher::spawn(sink.clone(), 256, Duration::from_secs(1));
            let service = JournalService::new(Arc::new(InMemoryJournalStore::new()), dispatcher);

            let fixture = Self {
                service,
                sink,
                author: Actor::new(Uuid::new_v4(), Role::Author),
                editor: Actor::new(Uuid::new_v4(), Role::Editor),
                admin: Actor::new(Uuid::new_v4(), Role::Admin),
            };
            for actor in [fixture.author, fixture.editor, fixture.admin] {
                fixture.register(actor).await;
            }
            fixture
        }

        /// Put an actor into the user directory
        pub async fn register(&self, actor: Actor) {
            self.service
                .store()
                .upsert_user(UserRecord {
                    id: actor.id,
                    display_name: format!("{} {}", actor.role, actor.id),
                    email: None,
                    role: actor.role,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        pub async fn reviewer(&self) -> Actor {
            let reviewer = Actor::new(Uuid::new_v4(), Role::Reviewer);
            self.register(reviewer).await;
            reviewer
        }

        pub async fn submission(&self) -> Submission {
            self.service
                .create_submission(&self.author, new_submission())
                .await
                .unwrap()
        }
    }

    pub fn new_submission() -> NewSubmission {
        NewSubmission {
            title: "Sparse attention in protein folding".to_string(),
            abstract_text: "We show that sparse attention suffices for folding.".to_string(),
            keywords: vec![
                "attention".to_string(),
                "proteins".to_string(),
                "sparsity".to_string(),
            ],
            co_authors: vec!["Grace Hopper".to_string()],
            manuscript_reference: "sha256:first-draft".to_string(),
        }
    }

    pub fn review_input(recommendation: crate::domain::Recommendation) -> ReviewInput {
        ReviewInput {
            comments: "Methodology needs a second look.".to_string(),
            recommendation,
        }
    }
}
