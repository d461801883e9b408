//! The narrator seam

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step to narrate, as the dashboard sends it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepNarration {
    /// Execution the step belongs to
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Step name
    #[serde(default)]
    pub step_id: String,
    /// Recorded step data (status, input, output, error, logs)
    #[serde(default)]
    pub step_data: Value,
}

impl StepNarration {
    /// `stepData.status`, if present
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.step_data.get("status").and_then(Value::as_str)
    }

    /// `stepData.error`, if present
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.step_data.get("error").and_then(Value::as_str)
    }
}

/// A whole execution to narrate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNarration {
    /// Execution id
    pub execution_id: String,
    /// Serialized execution record
    pub record: Value,
    /// Optional question from the user
    #[serde(default)]
    pub question: Option<String>,
}

/// Turns execution data into prose
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Provider name
    fn name(&self) -> &'static str;

    /// Explain what happened in one step
    async fn analyze_step(&self, step: &StepNarration) -> Result<String>;

    /// Suggest how to recover a failed step
    async fn recovery_suggestion(&self, step: &StepNarration) -> Result<String>;

    /// Suggest improvements, one per entry
    async fn improvements(&self, step: &StepNarration) -> Result<Vec<String>>;

    /// Explain a whole execution
    async fn explain_execution(&self, execution: &ExecutionNarration) -> Result<String>;
}
