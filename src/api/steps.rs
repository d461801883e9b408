//! Step detail endpoint
//!
//! GET /steps/:id - The named step of the latest execution

use axum::{extract::Path, routing::get, Extension, Json, Router};
use serde::Serialize;
use tracing::debug;

use stepsos_core::{ExecutionGateway, StepRecord, StepStatus};

use super::{api_error, ApiError, ErrorResponse};

const NO_DATA: &str = "No execution data";

/// Recorded step, or a pending placeholder when nothing ran it yet
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StepView {
    Recorded(StepRecord),
    Placeholder {
        name: String,
        status: StepStatus,
        logs: Vec<String>,
    },
}

impl StepView {
    fn placeholder(name: String) -> Self {
        Self::Placeholder {
            name,
            status: StepStatus::Pending,
            logs: vec![NO_DATA.to_string()],
        }
    }
}

/// Create steps routes
pub fn steps_routes() -> Router {
    Router::new().route("/steps/:id", get(get_step))
}

/// Step of the most recent execution
#[utoipa::path(
    get,
    path = "/steps/{id}",
    tag = "steps",
    params(
        ("id" = String, Path, description = "Step name")
    ),
    responses(
        (status = 200, description = "Step record, or a pending placeholder"),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn get_step(
    Extension(gateway): Extension<ExecutionGateway>,
    Path(name): Path<String>,
) -> Result<Json<StepView>, ApiError> {
    let latest = gateway.store().latest().map_err(api_error)?;
    let recorded = latest.and_then(|mut record| {
        let index = record.steps.iter().position(|step| step.name == name)?;
        Some(record.steps.swap_remove(index))
    });

    Ok(Json(match recorded {
        Some(step) => StepView::Recorded(step),
        None => {
            debug!(step = %name, "No recorded data for step");
            StepView::placeholder(name)
        }
    }))
}
