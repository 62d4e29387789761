//! Submission management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{extract::AppJson, AppState};
use peerdesk_common::{
    auth::Actor,
    domain::{Submission, SubmissionStatus},
    errors::Result,
    lifecycle::NewSubmission,
};

/// Request to move a submission to another status
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: SubmissionStatus,

    /// Editor comments, visible to the author
    #[serde(default)]
    pub comments: Option<String>,
}

/// Request to swap in a revised manuscript
#[derive(Debug, Deserialize)]
pub struct ReplaceManuscriptRequest {
    pub manuscript_reference: String,
}

/// Create a new submission owned by the caller
pub async fn create_submission(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(request): AppJson<NewSubmission>,
) -> Result<(StatusCode, Json<Submission>)> {
    let submission = state.journal.create_submission(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Get a submission by ID
pub async fn get_submission(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<Submission>> {
    let submission = state.journal.get_submission(&actor, submission_id).await?;
    Ok(Json(submission))
}

/// Delete a submission no review refers to
pub async fn delete_submission(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.journal.delete_submission(&actor, submission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Editorial status change
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
    AppJson(request): AppJson<StatusRequest>,
) -> Result<Json<Submission>> {
    let submission = state
        .journal
        .update_status(&actor, submission_id, request.status, request.comments)
        .await?;
    Ok(Json(submission))
}

/// Author re-upload while revisions are required
pub async fn replace_manuscript(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
    AppJson(request): AppJson<ReplaceManuscriptRequest>,
) -> Result<Json<Submission>> {
    let submission = state
        .journal
        .replace_manuscript(&actor, submission_id, request.manuscript_reference)
        .await?;
    Ok(Json(submission))
}
