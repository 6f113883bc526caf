use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use portal_core::error::ApiError;
use portal_core::solutions::DescriptionBlock;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::refinement;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/refine", post(refine_description))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RefineRequest {
    /// Free-form description written by the participants
    pub raw_text: String,
    pub scenario_ids: Vec<String>,
}

/// Refine a free-form description into the four structured fields
///
/// Fields the model could not produce carry placeholder text, never blanks.
/// A failing or slow model is a 503 `refinement_unavailable`, never a
/// silently truncated description.
#[utoipa::path(
    post,
    path = "/v1/refine",
    request_body = RefineRequest,
    responses(
        (status = 200, description = "Structured description", body = DescriptionBlock),
        (status = 400, description = "Empty text or unknown scenarios", body = ApiError),
        (status = 503, description = "Refinement unavailable", body = ApiError)
    ),
    tag = "refinement"
)]
pub async fn refine_description(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefineRequest>,
) -> Result<Json<DescriptionBlock>, AppError> {
    let block = refinement::refine(
        state.agent.as_ref(),
        &state.catalog,
        &req.raw_text,
        &req.scenario_ids,
    )
    .await?;
    Ok(Json(block))
}
