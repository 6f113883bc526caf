use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use portal_core::error::ApiError;
use portal_core::scenarios::{Cohort, Scenario};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/scenarios", get(list_scenarios))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ScenarioQuery {
    /// Cohort filter ("A" or "B"). Omit for the whole catalog.
    pub turma: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ScenarioListResponse {
    pub data: Vec<Scenario>,
}

/// List the scenario catalog
///
/// Catalog order is stable. A filter that matches nothing yields an empty list.
#[utoipa::path(
    get,
    path = "/v1/scenarios",
    params(ScenarioQuery),
    responses(
        (status = 200, description = "Scenarios in catalog order", body = ScenarioListResponse),
        (status = 400, description = "Unknown cohort", body = ApiError)
    ),
    tag = "scenarios"
)]
pub async fn list_scenarios(
    State(state): State<AppState>,
    Query(query): Query<ScenarioQuery>,
) -> Result<Json<ScenarioListResponse>, AppError> {
    let cohort = match query.turma.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Cohort>().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("turma".to_string()),
            received: Some(serde_json::Value::String(raw.to_string())),
            docs_hint: Some("Use turma=A or turma=B.".to_string()),
        })?),
    };

    let data = state.catalog.list(cohort).into_iter().cloned().collect();
    Ok(Json(ScenarioListResponse { data }))
}
