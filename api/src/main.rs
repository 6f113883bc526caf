use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod dialogue;
mod error;
mod extract;
mod genai;
mod middleware;
mod refinement;
mod registration;
mod routes;
mod state;
mod store;

use config::{Settings, StoreBackend};
use state::AppState;
use store::{MemorySolutionStore, PgSolutionStore, SolutionStore};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Solution Portal API",
        version = "0.1.0",
        description = "Registration of design-fiction solutions, by form or guided dialogue."
    ),
    paths(
        routes::health::health_check,
        routes::system::get_system_config,
        routes::scenarios::list_scenarios,
        routes::solutions::list_solutions,
        routes::solutions::create_solution,
        routes::solutions::update_solution,
        routes::solutions::delete_solution,
        routes::refine::refine_description,
        routes::dialogue::start_session,
        routes::dialogue::get_session,
        routes::dialogue::abandon_session,
        routes::dialogue::send_message,
        routes::dialogue::present_for_review,
        routes::dialogue::apply_edit,
        routes::dialogue::confirm,
    ),
    components(schemas(
        HealthResponse,
        portal_core::error::ApiError,
        portal_core::error::FieldViolation,
        portal_core::scenarios::Cohort,
        portal_core::scenarios::Scenario,
        portal_core::solutions::Participant,
        portal_core::solutions::DescriptionBlock,
        portal_core::solutions::ImageKind,
        portal_core::solutions::ImageReference,
        portal_core::solutions::SubmissionForm,
        portal_core::solutions::PartialDescription,
        portal_core::solutions::Solution,
        portal_core::solutions::SubmitterRole,
        portal_core::dialogue::DialoguePhase,
        portal_core::dialogue::Draft,
        portal_core::dialogue::ChatTurn,
        portal_core::dialogue::TurnRole,
        routes::system::SystemConfigResponse,
        routes::scenarios::ScenarioListResponse,
        routes::solutions::SolutionListResponse,
        routes::refine::RefineRequest,
        routes::dialogue::MessageRequest,
        routes::dialogue::EditRequest,
        dialogue::SessionView,
        dialogue::ToolOutcome,
        dialogue::ToolNotice,
        dialogue::TurnOutcome,
        dialogue::ConfirmOutcome,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "portal api failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let store: Arc<dyn SolutionStore> = match &settings.store {
        StoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(settings.store_timeout)
                .connect(database_url)
                .await?;
            sqlx::migrate!("../migrations").run(&pool).await?;
            Arc::new(PgSolutionStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; solutions are lost on restart");
            Arc::new(MemorySolutionStore::new())
        }
    };

    let agent = Arc::new(genai::GeminiClient::from_settings(&settings)?);
    if settings.genai_api_key.is_none() {
        tracing::warn!("PORTAL_GENAI_API_KEY not set; refinement and dialogue will answer 503");
    }

    let port = settings.port;
    let app_state = AppState::new(settings, store, agent);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::system::router().layer(middleware::rate_limit::read_layer()))
        .merge(routes::scenarios::router().layer(middleware::rate_limit::read_layer()))
        .merge(routes::solutions::read_router().layer(middleware::rate_limit::read_layer()))
        .merge(routes::solutions::write_router().layer(middleware::rate_limit::write_layer()))
        .merge(routes::refine::router().layer(middleware::rate_limit::write_layer()))
        .merge(routes::dialogue::router().layer(middleware::rate_limit::dialogue_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Portal API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
