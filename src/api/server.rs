use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::api::ors::OrsClient;
use crate::config::{AppConfig, SolveConfig};
use crate::domain::analysis::RouteAnalysisResult;
use crate::domain::location::Location;
use crate::domain::registry::LocationRegistry;
use crate::domain::schedule::ScheduleEntry;
use crate::error::RoutingError;
use crate::pipeline::Cvrp;
use crate::solvers::{SolverKind, SolverParams};

#[derive(Debug, Deserialize)]
pub struct OptimizeConfig {
    pub settings: SolveConfig,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub config: OptimizeConfig,
    pub locations: Vec<Location>,
}

/// Validation failures map to 400, everything else to 500, mirroring the
/// error taxonomy of the core.
struct ApiError(RoutingError);

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            error!("request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/api/optimize", post(optimize))
        .route("/api/solvers", get(list_solvers))
        .route("/api/config", get(default_config))
        .layer(CorsLayer::permissive())
}

pub async fn start_api_server(port: u16) -> Result<(), RoutingError> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("API server listening on port {port}");
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Run the full pipeline for the posted config and locations. Results come
/// back ordered by schedule, then day.
async fn optimize(
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<Vec<RouteAnalysisResult>>, ApiError> {
    if request.config.schedules.is_empty() {
        return Err(RoutingError::UnknownSchedule("no schedules in request".into()).into());
    }

    let cvrp = Cvrp::from_config(&request.config.settings)?;
    let schedules = request.config.schedules;
    // Duplicate ids collapse here; the registry is id-idempotent.
    let mut registry = LocationRegistry::from_locations(request.locations);

    let outcome = tokio::task::spawn_blocking(move || cvrp.process(&schedules, &mut registry))
        .await
        .map_err(|e| RoutingError::Config(format!("optimization task failed: {e}")))?;

    let mut results = outcome.results;
    results.sort_by(|a, b| {
        a.base_schedule_id
            .cmp(&b.base_schedule_id)
            .then(a.collection_day.cmp(&b.collection_day))
    });

    // Road geometry is a best-effort enrichment; failures leave the
    // straight-line results intact.
    if let Some(ors) = OrsClient::from_env() {
        for result in &mut results {
            ors.attach_road_paths(result).await;
        }
    }

    Ok(Json(results))
}

async fn list_solvers() -> Json<serde_json::Value> {
    let params = SolverParams::default();
    let solvers: Vec<serde_json::Value> = SolverKind::all()
        .iter()
        .map(|kind| {
            let solver = kind.build(&params);
            json!({
                "id": solver.id(),
                "name": solver.name(),
                "description": solver.description(),
            })
        })
        .collect();
    Json(json!({ "solvers": solvers }))
}

async fn default_config() -> Json<AppConfig> {
    Json(AppConfig::default())
}
