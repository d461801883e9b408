//! Narration endpoints
//!
//! POST /ai/analyze-step - Describe what a step did
//! POST /ai/auto-recovery - Suggest how to recover a failed step
//! POST /ai/improvements - Suggest improvements for a step
//! POST /ai/explain - Narrate a stored execution
//!
//! Narration never fails: the service falls back to the local narrator.

use std::sync::Arc;

use axum::{routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stepsos_core::ExecutionGateway;
use stepsos_llm::{ExecutionNarration, NarrationService, StepNarration};

use super::{api_error, ApiError, ErrorResponse};

/// Prose analysis of one step
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalysisResponse {
    pub analysis: String,
}

/// How to recover a failed step
#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryResponse {
    pub suggestion: String,
}

/// Improvement suggestions, one per entry
#[derive(Debug, Serialize, ToSchema)]
pub struct ImprovementsResponse {
    pub suggestions: Vec<String>,
}

/// Ask about a stored execution
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub execution_id: String,
    #[serde(default)]
    pub question: Option<String>,
}

/// Answer about a stored execution
#[derive(Debug, Serialize, ToSchema)]
pub struct ExplainResponse {
    pub response: String,
}

/// Create narration routes
pub fn ai_routes() -> Router {
    Router::new()
        .route("/ai/analyze-step", post(analyze_step))
        .route("/ai/auto-recovery", post(auto_recovery))
        .route("/ai/improvements", post(improvements))
        .route("/ai/explain", post(explain))
}

/// Analyze a step
#[utoipa::path(
    post,
    path = "/ai/analyze-step",
    tag = "ai",
    responses(
        (status = 200, description = "Step analysis", body = AnalysisResponse)
    )
)]
pub async fn analyze_step(
    Extension(narration): Extension<Arc<NarrationService>>,
    Json(step): Json<StepNarration>,
) -> Json<AnalysisResponse> {
    Json(AnalysisResponse {
        analysis: narration.analyze_step(&step).await,
    })
}

/// Suggest a recovery
#[utoipa::path(
    post,
    path = "/ai/auto-recovery",
    tag = "ai",
    responses(
        (status = 200, description = "Recovery suggestion", body = RecoveryResponse)
    )
)]
pub async fn auto_recovery(
    Extension(narration): Extension<Arc<NarrationService>>,
    Json(step): Json<StepNarration>,
) -> Json<RecoveryResponse> {
    Json(RecoveryResponse {
        suggestion: narration.recovery_suggestion(&step).await,
    })
}

/// Suggest improvements
#[utoipa::path(
    post,
    path = "/ai/improvements",
    tag = "ai",
    responses(
        (status = 200, description = "Improvement suggestions", body = ImprovementsResponse)
    )
)]
pub async fn improvements(
    Extension(narration): Extension<Arc<NarrationService>>,
    Json(step): Json<StepNarration>,
) -> Json<ImprovementsResponse> {
    Json(ImprovementsResponse {
        suggestions: narration.improvements(&step).await,
    })
}

/// Explain a stored execution
#[utoipa::path(
    post,
    path = "/ai/explain",
    tag = "ai",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Narrated execution", body = ExplainResponse),
        (status = 404, description = "Execution not found", body = ErrorResponse)
    )
)]
pub async fn explain(
    Extension(gateway): Extension<ExecutionGateway>,
    Extension(narration): Extension<Arc<NarrationService>>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let record = gateway.store().get(&request.execution_id).map_err(api_error)?;
    let record = serde_json::to_value(&record)
        .map_err(|e| api_error(stepsos_core::Error::Internal(e.to_string())))?;

    let execution = ExecutionNarration {
        execution_id: request.execution_id,
        record,
        question: request.question,
    };
    Ok(Json(ExplainResponse {
        response: narration.explain_execution(&execution).await,
    }))
}
