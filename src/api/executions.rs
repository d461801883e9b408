//! Executions API endpoints
//!
//! POST /execute - Submit a payload to the pipeline
//! POST /replay - Rerun a stored execution's input
//! GET /executions - List executions with the pipeline graph
//! GET /executions/:id - Get one execution record

use axum::{extract::Path, http::StatusCode, routing::get, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use utoipa::ToSchema;

use stepsos_core::{pipeline_graph, Error, ExecutionGateway, ExecutionRecord, PipelineGraph};

use super::{api_error, ApiError, ErrorResponse};

/// Outcome of a submission
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResponse {
    fn accepted(execution_id: String) -> Self {
        Self {
            accepted: true,
            execution_id: Some(execution_id),
            error: None,
        }
    }

    fn refused(execution_id: Option<String>, error: String) -> Self {
        Self {
            accepted: false,
            execution_id,
            error: Some(error),
        }
    }
}

/// Replay request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
    pub execution_id: String,
}

/// Every stored execution plus the pipeline view
#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutionsView {
    #[schema(value_type = Vec<Object>)]
    pub executions: Vec<ExecutionRecord>,
    #[schema(value_type = Object)]
    pub graph: PipelineGraph,
}

/// Create executions routes
pub fn executions_routes() -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/replay", post(replay))
        .route("/executions", get(list_executions))
        .route("/executions/:id", get(get_execution))
}

fn submission_response(
    result: stepsos_core::Result<String>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let (status, body) = match result {
        Ok(id) => (StatusCode::OK, ExecuteResponse::accepted(id)),
        Err(Error::RejectedExecution {
            execution_id,
            reason,
        }) => (
            StatusCode::BAD_REQUEST,
            ExecuteResponse::refused(Some(execution_id), reason),
        ),
        Err(Error::DuplicateExecution(id)) => {
            let message = format!("duplicate execution id: {id}");
            (StatusCode::CONFLICT, ExecuteResponse::refused(Some(id), message))
        }
        Err(err @ Error::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            ExecuteResponse::refused(None, err.to_string()),
        ),
        Err(Error::ShuttingDown) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ExecuteResponse::refused(None, Error::ShuttingDown.to_string()),
        ),
        Err(err) => {
            error!(error = %err, "Submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ExecuteResponse::refused(None, err.to_string()),
            )
        }
    };
    (status, Json(body))
}

/// Submit a payload
///
/// The body is routed by shape: an object with `input` is a workflow
/// envelope, `{replay: true, executionId}` replays, anything else is run as
/// the raw input.
#[utoipa::path(
    post,
    path = "/execute",
    tag = "executions",
    responses(
        (status = 200, description = "Execution accepted", body = ExecuteResponse),
        (status = 400, description = "Rejected by the contract gate", body = ExecuteResponse),
        (status = 404, description = "Replay target not found", body = ExecuteResponse),
        (status = 409, description = "Execution id already used", body = ExecuteResponse),
        (status = 503, description = "Server shutting down", body = ExecuteResponse)
    )
)]
pub async fn execute(
    Extension(gateway): Extension<ExecutionGateway>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let result = gateway.submit_value(body);
    if let Err(e) = &result {
        warn!(error = %e, "Submission refused");
    }
    submission_response(result)
}

/// Replay a stored execution under a fresh id
#[utoipa::path(
    post,
    path = "/replay",
    tag = "executions",
    request_body = ReplayRequest,
    responses(
        (status = 200, description = "Replay accepted", body = ExecuteResponse),
        (status = 404, description = "Execution not found", body = ExecuteResponse),
        (status = 503, description = "Server shutting down", body = ExecuteResponse)
    )
)]
pub async fn replay(
    Extension(gateway): Extension<ExecutionGateway>,
    Json(request): Json<ReplayRequest>,
) -> (StatusCode, Json<ExecuteResponse>) {
    submission_response(gateway.replay(&request.execution_id))
}

/// List executions in creation order
#[utoipa::path(
    get,
    path = "/executions",
    tag = "executions",
    responses(
        (status = 200, description = "Executions and pipeline graph", body = ExecutionsView)
    )
)]
pub async fn list_executions(
    Extension(gateway): Extension<ExecutionGateway>,
) -> Result<Json<ExecutionsView>, ApiError> {
    let store = gateway.store();
    let executions: Vec<ExecutionRecord> = store.list().map_err(api_error)?.iter().collect();
    let graph = pipeline_graph(gateway.runner().pipeline(), executions.last());

    Ok(Json(ExecutionsView { executions, graph }))
}

/// Get one execution
#[utoipa::path(
    get,
    path = "/executions/{id}",
    tag = "executions",
    params(
        ("id" = String, Path, description = "Execution ID")
    ),
    responses(
        (status = 200, description = "Execution record"),
        (status = 404, description = "Execution not found", body = ErrorResponse)
    )
)]
pub async fn get_execution(
    Extension(gateway): Extension<ExecutionGateway>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    gateway.store().get(&id).map(Json).map_err(api_error)
}
