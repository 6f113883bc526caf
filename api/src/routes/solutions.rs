use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use portal_core::error::ApiError;
use portal_core::solutions::{Solution, SubmissionForm};

use crate::error::AppError;
use crate::extract::{AppJson, IdPath, Role};
use crate::state::AppState;

pub fn read_router() -> Router<AppState> {
    Router::new().route("/v1/solutions", get(list_solutions))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/v1/solutions", axum::routing::post(create_solution))
        .route(
            "/v1/solutions/{id}",
            put(update_solution).delete(delete_solution),
        )
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SolutionListResponse {
    pub data: Vec<Solution>,
    /// Clients should re-fetch after this many seconds
    pub poll_interval_secs: u64,
}

/// List every registered solution, newest first
#[utoipa::path(
    get,
    path = "/v1/solutions",
    responses(
        (status = 200, description = "All solutions, newest submission first", body = SolutionListResponse),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "solutions"
)]
pub async fn list_solutions(
    State(state): State<AppState>,
) -> Result<Json<SolutionListResponse>, AppError> {
    let data = state.registrar().list().await?;
    Ok(Json(SolutionListResponse {
        data,
        poll_interval_secs: state.settings.poll_interval.as_secs(),
    }))
}

/// Register a solution
///
/// Every constraint is checked before anything is written; a 400 lists all
/// violations in `details`. Send `x-portal-role: professor` to reference
/// scenarios outside the solution's cohort.
#[utoipa::path(
    post,
    path = "/v1/solutions",
    request_body = SubmissionForm,
    params(("x-portal-role" = Option<String>, Header, description = "student (default) or professor")),
    responses(
        (status = 201, description = "Solution registered", body = Solution),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "solutions"
)]
pub async fn create_solution(
    State(state): State<AppState>,
    Role(role): Role,
    AppJson(form): AppJson<SubmissionForm>,
) -> Result<(StatusCode, Json<Solution>), AppError> {
    let solution = state.registrar().submit(form, role).await?;
    Ok((StatusCode::CREATED, Json(solution)))
}

/// Replace every mutable field of a solution
///
/// Id and submission time are kept.
#[utoipa::path(
    put,
    path = "/v1/solutions/{id}",
    params(
        ("id" = Uuid, Path, description = "Solution id"),
        ("x-portal-role" = Option<String>, Header, description = "student (default) or professor")
    ),
    request_body = SubmissionForm,
    responses(
        (status = 200, description = "Solution updated", body = Solution),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Unknown id", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "solutions"
)]
pub async fn update_solution(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Role(role): Role,
    AppJson(form): AppJson<SubmissionForm>,
) -> Result<Json<Solution>, AppError> {
    Ok(Json(state.registrar().update(id, form, role).await?))
}

/// Delete a solution
#[utoipa::path(
    delete,
    path = "/v1/solutions/{id}",
    params(("id" = Uuid, Path, description = "Solution id")),
    responses(
        (status = 204, description = "Solution deleted"),
        (status = 404, description = "Unknown id", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "solutions"
)]
pub async fn delete_solution(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state.registrar().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
