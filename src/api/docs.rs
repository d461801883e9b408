//! API documentation
//!
//! Serves the OpenAPI document at /api-docs/openapi.json

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use super::{
    ai::{AnalysisResponse, ExplainRequest, ExplainResponse, ImprovementsResponse, RecoveryResponse},
    executions::{ExecuteResponse, ExecutionsView, ReplayRequest},
    health::HealthResponse,
    ErrorResponse,
};

/// StepsOS API OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "StepsOS API",
        version = "1.0.0",
        description = "Step pipeline execution server.

## Overview
- **Executions**: submit payloads, replay them and inspect every step
- **Graph**: lineage of one execution
- **AI**: narration of steps and executions
- **Events**: live lifecycle feed over WebSocket at `/ws`
",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        crate::api::executions::execute,
        crate::api::executions::replay,
        crate::api::executions::list_executions,
        crate::api::executions::get_execution,
        crate::api::graph::get_lineage,
        crate::api::steps::get_step,
        crate::api::ai::analyze_step,
        crate::api::ai::auto_recovery,
        crate::api::ai::improvements,
        crate::api::ai::explain,
        crate::api::health::health,
    ),
    components(
        schemas(
            ExecuteResponse,
            ReplayRequest,
            ExecutionsView,
            AnalysisResponse,
            RecoveryResponse,
            ImprovementsResponse,
            ExplainRequest,
            ExplainResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "executions", description = "Submission and execution history"),
        (name = "graph", description = "Execution lineage"),
        (name = "steps", description = "Step detail"),
        (name = "ai", description = "Narration"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;

/// Create docs routes
pub fn docs_routes() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
