//! Lineage graph endpoint
//!
//! GET /api/executions/:id/graph - Step-by-step data flow of one execution

use axum::{extract::Path, routing::get, Extension, Json, Router};

use stepsos_core::{lineage_graph, ExecutionGateway, LineageGraph};

use super::{api_error, ApiError, ErrorResponse};

/// Create graph routes
pub fn graph_routes() -> Router {
    Router::new().route("/api/executions/:id/graph", get(get_lineage))
}

/// Lineage of one execution
#[utoipa::path(
    get,
    path = "/api/executions/{id}/graph",
    tag = "graph",
    params(
        ("id" = String, Path, description = "Execution ID")
    ),
    responses(
        (status = 200, description = "Nodes carry each step's input, output, error and logs"),
        (status = 404, description = "Execution not found", body = ErrorResponse)
    )
)]
pub async fn get_lineage(
    Extension(gateway): Extension<ExecutionGateway>,
    Path(id): Path<String>,
) -> Result<Json<LineageGraph>, ApiError> {
    let record = gateway.store().get(&id).map_err(api_error)?;
    Ok(Json(lineage_graph(&record)))
}
