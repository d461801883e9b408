//! Health check endpoint
//!
//! `/health` reports liveness plus a few execution counters.

use std::sync::Arc;

use axum::{response::Json, routing::get, Extension, Router};
use serde::Serialize;
use utoipa::ToSchema;

use stepsos_core::{EventBus, ExecutionGateway, ShutdownController};

/// Health response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy`, or `shutting_down` once new work is refused
    pub status: String,
    pub version: String,
    /// Stored executions
    pub executions: usize,
    /// Event bus listeners (one per feed client, plus in-process observers)
    pub subscribers: usize,
    /// Runs not yet terminal
    pub in_flight: usize,
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

/// Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(
    Extension(gateway): Extension<ExecutionGateway>,
    Extension(bus): Extension<EventBus>,
    Extension(shutdown): Extension<Arc<ShutdownController>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if shutdown.is_accepting_work() {
            "healthy"
        } else {
            "shutting_down"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        executions: gateway.store().len(),
        subscribers: bus.subscriber_count(),
        in_flight: gateway.in_flight(),
    })
}
