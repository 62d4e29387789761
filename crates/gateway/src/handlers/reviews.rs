//! Review assignment and submission handlers

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
    domain::{Review, ReviewSummary},
    errors::Result,
    lifecycle::ReviewInput,
};

/// Request to assign a reviewer
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub reviewer_id: Uuid,
}

/// A review, filed by the caller unless an admin names another reviewer
#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    #[serde(default)]
    pub reviewer_id: Option<Uuid>,

    #[serde(flatten)]
    pub review: ReviewInput,
}

/// Assign a reviewer to a submission
pub async fn assign_reviewer(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
    AppJson(request): AppJson<AssignRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state
        .journal
        .assign_reviewer(&actor, submission_id, request.reviewer_id)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Complete an assigned review or file one directly
pub async fn submit_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
    AppJson(request): AppJson<SubmitReviewRequest>,
) -> Result<Json<Review>> {
    let reviewer_id = request.reviewer_id.unwrap_or(actor.id);
    let review = state
        .journal
        .submit_review(&actor, submission_id, reviewer_id, request.review)
        .await?;
    Ok(Json(review))
}

/// Reviews of a submission visible to the caller
pub async fn list_reviews(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>> {
    let reviews = state.journal.list_reviews(&actor, submission_id).await?;
    Ok(Json(reviews))
}

/// Recommendation counts over completed reviews
pub async fn review_summary(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<ReviewSummary>> {
    let summary = state
        .journal
        .get_review_summary(&actor, submission_id)
        .await?;
    Ok(Json(summary))
}
