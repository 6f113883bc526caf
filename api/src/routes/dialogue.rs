use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use portal_core::error::ApiError;

use crate::dialogue::{ConfirmOutcome, DialogueSession, SessionView, TurnOutcome};
use crate::error::AppError;
use crate::extract::{AppJson, IdPath, Role};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/dialogue/sessions", post(start_session))
        .route(
            "/v1/dialogue/sessions/{id}",
            get(get_session).delete(abandon_session),
        )
        .route("/v1/dialogue/sessions/{id}/messages", post(send_message))
        .route("/v1/dialogue/sessions/{id}/review", post(present_for_review))
        .route("/v1/dialogue/sessions/{id}/edits", post(apply_edit))
        .route("/v1/dialogue/sessions/{id}/confirm", post(confirm))
}

fn session(state: &AppState, id: Uuid) -> Result<Arc<Mutex<DialogueSession>>, AppError> {
    state.sessions.get(id).ok_or_else(|| AppError::NotFound {
        resource: format!("dialogue session {id}"),
    })
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EditRequest {
    /// Field path, e.g. `solution_name`, `participantes` or `descricao_refinada.resumo`
    pub path: String,
    /// New value; `null` clears optional fields
    pub value: serde_json::Value,
}

/// Start a registration dialogue
#[utoipa::path(
    post,
    path = "/v1/dialogue/sessions",
    params(("x-portal-role" = Option<String>, Header, description = "student (default) or professor")),
    responses(
        (status = 201, description = "Session created", body = SessionView)
    ),
    tag = "dialogue"
)]
pub async fn start_session(
    State(state): State<AppState>,
    Role(role): Role,
) -> (StatusCode, Json<SessionView>) {
    let (_, session) = state.sessions.create(role);
    let view = session.lock().await.view();
    (StatusCode::CREATED, Json(view))
}

/// Current phase, draft and history of a session
#[utoipa::path(
    get,
    path = "/v1/dialogue/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state", body = SessionView),
        (status = 404, description = "Unknown or expired session", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn get_session(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<SessionView>, AppError> {
    let session = session(&state, id)?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// Abandon a session
///
/// The draft is discarded; nothing is persisted.
#[utoipa::path(
    delete,
    path = "/v1/dialogue/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session abandoned"),
        (status = 404, description = "Unknown or expired session", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn abandon_session(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound {
            resource: format!("dialogue session {id}"),
        })
    }
}

/// Send one participant message
///
/// The agent answers and may request operations; each one's outcome is
/// listed in `notices`. When the agent is unreachable nothing is recorded
/// and the same message can be sent again.
#[utoipa::path(
    post,
    path = "/v1/dialogue/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Agent reply and tool outcomes", body = TurnOutcome),
        (status = 400, description = "Empty message", body = ApiError),
        (status = 404, description = "Unknown or expired session", body = ApiError),
        (status = 503, description = "Conversation unavailable", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn send_message(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    AppJson(req): AppJson<MessageRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let session = session(&state, id)?;
    let mut session = session.lock().await;
    let outcome = state
        .orchestrator()
        .handle_message(&mut session, &req.message)
        .await?;
    Ok(Json(outcome))
}

/// Present the draft for review
#[utoipa::path(
    post,
    path = "/v1/dialogue/sessions/{id}/review",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Draft under review", body = SessionView),
        (status = 400, description = "Draft incomplete", body = ApiError),
        (status = 404, description = "Unknown or expired session", body = ApiError),
        (status = 409, description = "Not possible in the current phase", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn present_for_review(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<SessionView>, AppError> {
    let session = session(&state, id)?;
    let mut session = session.lock().await;
    Ok(Json(state.orchestrator().present(&mut session)?))
}

/// Edit one draft field
///
/// Editing a confirmed draft withdraws the confirmation.
#[utoipa::path(
    post,
    path = "/v1/dialogue/sessions/{id}/edits",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = EditRequest,
    responses(
        (status = 200, description = "Draft updated", body = SessionView),
        (status = 400, description = "Unknown path or invalid value", body = ApiError),
        (status = 404, description = "Unknown or expired session", body = ApiError),
        (status = 409, description = "Not possible in the current phase", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn apply_edit(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    AppJson(req): AppJson<EditRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = session(&state, id)?;
    let mut session = session.lock().await;
    Ok(Json(
        state.orchestrator().edit(&mut session, &req.path, req.value)?,
    ))
}

/// Confirm the reviewed draft and register it
///
/// Only a participant calls this; the agent has no way to confirm. Repeating
/// it after success returns the same record with `already_submitted: true`.
#[utoipa::path(
    post,
    path = "/v1/dialogue/sessions/{id}/confirm",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Solution registered", body = ConfirmOutcome),
        (status = 400, description = "Draft fails validation; back to review", body = ApiError),
        (status = 404, description = "Unknown or expired session", body = ApiError),
        (status = 409, description = "Draft is not under review", body = ApiError),
        (status = 503, description = "Store unavailable; confirmation kept for retry", body = ApiError)
    ),
    tag = "dialogue"
)]
pub async fn confirm(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let session = session(&state, id)?;
    let mut session = session.lock().await;
    Ok(Json(state.orchestrator().confirm(&mut session).await?))
}
