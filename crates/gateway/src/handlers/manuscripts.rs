//! Manuscript upload and download

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::AppState;
use peerdesk_common::{auth::Actor, errors::Result};

#[derive(Serialize)]
pub struct UploadResponse {
    pub reference: String,
    pub size: usize,
}

/// Store the raw request body as a manuscript
pub async fn upload(
    State(state): State<AppState>,
    actor: Actor,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let reference = state.manuscripts.store(&body).await?;

    tracing::info!(
        actor_id = %actor.id,
        reference = %reference,
        size = body.len(),
        "Manuscript uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            reference,
            size: body.len(),
        }),
    ))
}

/// Fetch a manuscript by reference
pub async fn download(
    State(state): State<AppState>,
    _actor: Actor,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let bytes = state.manuscripts.fetch(&reference).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}
