//! Web API module for StepsOS
//!
//! Provides REST endpoints for:
//! - Submitting and replaying executions
//! - Execution history and per-step detail
//! - Lineage graphs
//! - Narration of steps and executions
//! - Health and API documentation

pub mod ai;
pub mod docs;
pub mod executions;
pub mod graph;
pub mod health;
pub mod steps;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

pub use ai::ai_routes;
pub use docs::docs_routes;
pub use executions::executions_routes;
pub use graph::graph_routes;
pub use health::health_routes;
pub use steps::steps_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(executions_routes())
        .merge(graph_routes())
        .merge(steps_routes())
        .merge(ai_routes())
}

/// Error body for non-submission endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a core error to a status code and body
pub(crate) fn api_error(err: stepsos_core::Error) -> ApiError {
    let status = match &err {
        stepsos_core::Error::NotFound(_) => StatusCode::NOT_FOUND,
        stepsos_core::Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        stepsos_core::Error::DuplicateExecution(_) => StatusCode::CONFLICT,
        stepsos_core::Error::RejectedExecution { .. } | stepsos_core::Error::Step(_) => {
            StatusCode::BAD_REQUEST
        }
        stepsos_core::Error::Internal(_) | stepsos_core::Error::DuplicateStep(_) => {
            tracing::error!(error = %err, "Internal error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
