//! User directory handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{extract::AppJson, AppState};
use peerdesk_common::{
    auth::Actor,
    domain::UserRecord,
    errors::Result,
    lifecycle::NewUser,
};

/// Register or update a user and the role they hold
pub async fn register_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
    AppJson(request): AppJson<NewUser>,
) -> Result<Json<UserRecord>> {
    let user = state.journal.register_user(&actor, user_id, request).await?;
    Ok(Json(user))
}
