use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::genai::GenerativeAgent;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/system/config", get(get_system_config))
}

/// Response for GET /v1/system/config
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SystemConfigResponse {
    /// How often clients should re-fetch the solution list
    pub poll_interval_secs: u64,
    /// Upper bound on how long a new solution may stay invisible to other
    /// readers. Equal to the poll interval.
    pub staleness_window_secs: u64,
    /// Model behind refinement and the dialogue
    pub model: String,
    /// Whether the generative capability is configured at all
    pub assistant_available: bool,
    pub genai_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub version: String,
}

/// Client-facing runtime settings
///
/// Static for the lifetime of the process. Clients should read this once and
/// poll `/v1/solutions` at the advertised interval.
#[utoipa::path(
    get,
    path = "/v1/system/config",
    responses(
        (status = 200, description = "Runtime settings", body = SystemConfigResponse)
    ),
    tag = "system"
)]
pub async fn get_system_config(State(state): State<AppState>) -> Json<SystemConfigResponse> {
    let settings = &state.settings;
    Json(SystemConfigResponse {
        poll_interval_secs: settings.poll_interval.as_secs(),
        staleness_window_secs: settings.poll_interval.as_secs(),
        model: state.agent.model_id().to_string(),
        assistant_available: settings.genai_api_key.is_some(),
        genai_timeout_secs: settings.genai_timeout.as_secs(),
        store_timeout_secs: settings.store_timeout.as_secs(),
        session_ttl_secs: settings.session_ttl.as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
