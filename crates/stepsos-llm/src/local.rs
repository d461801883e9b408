//! Deterministic narrator built only from the recorded step data.

use crate::error::Result;
use crate::narrator::{ExecutionNarration, Narrator, StepNarration};
use async_trait::async_trait;
use serde_json::Value;

/// Offline narrator. Same input, same text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNarrator;

impl LocalNarrator {
    /// Analysis of one step
    #[must_use]
    pub fn describe_step(step: &StepNarration) -> String {
        let name = display_name(step);
        let status = step.status().unwrap_or("pending");
        let mut text = format!("Step '{name}' is {status}.");

        if let Some(error) = step.error() {
            text.push_str(&format!(" It failed with: {error}."));
        }
        if let Some(Value::Object(output)) = step.step_data.get("output") {
            let fields: Vec<&str> = output.keys().map(String::as_str).collect();
            if !fields.is_empty() {
                text.push_str(&format!(" Output fields: {}.", fields.join(", ")));
            }
        }
        if let Some(Value::Array(logs)) = step.step_data.get("logs") {
            if let Some(Value::String(last)) = logs.last() {
                text.push_str(&format!(" Last log: {last}"));
            }
        }
        text
    }

    /// Recovery hint derived from the error text
    #[must_use]
    pub fn recovery_for(step: &StepNarration) -> String {
        let name = display_name(step);
        let Some(error) = step.error() else {
            return format!("Step '{name}' has not failed; no recovery is needed.");
        };

        if error.contains("Unsupported fileType") {
            "Upload the file in a supported format (for example image/png or text/csv) and replay the execution.".to_string()
        } else if error.contains("is required") || error.contains("must be") {
            format!("Fix the input fields reported by '{name}' ({error}) and replay the execution.")
        } else if error.contains("requires validated input") {
            "Run the validate step before process; replay the execution through the full pipeline.".to_string()
        } else {
            format!("Inspect the input of '{name}' and replay the execution once the cause is fixed.")
        }
    }

    /// Improvement ideas for one step
    #[must_use]
    pub fn improvements_for(step: &StepNarration) -> Vec<String> {
        let name = display_name(step);
        let mut ideas = Vec::new();
        match step.status() {
            Some("failed") => {
                ideas.push(format!("Validate the input earlier so '{name}' fails fast with a clear message."));
                ideas.push("Attach the failing input to the alert sent to the uploader.".to_string());
            }
            Some("skipped") => {
                ideas.push(format!("Resolve the upstream failure so '{name}' can run."));
            }
            _ => {
                ideas.push(format!("Record timing for '{name}' to spot slow runs."));
            }
        }
        ideas.push("Add a checksum verification against the stored file.".to_string());
        ideas
    }

    /// Narrative of a whole execution
    #[must_use]
    pub fn explain(execution: &ExecutionNarration) -> String {
        let record = &execution.record;
        let status = record
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let mut text = format!("Execution {} is {status}.", execution.execution_id);

        if let Some(reason) = record.get("rejectionReason").and_then(Value::as_str) {
            text.push_str(&format!(" It was rejected before any step ran: {reason}."));
            return text;
        }

        let steps: Vec<String> = record
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .map(|s| {
                        let name = s.get("name").and_then(Value::as_str).unwrap_or("?");
                        let status = s.get("status").and_then(Value::as_str).unwrap_or("?");
                        match s.get("error").and_then(Value::as_str) {
                            Some(error) => format!("{name} {status} ({error})"),
                            None => format!("{name} {status}"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        if steps.is_empty() {
            text.push_str(" No step has run yet.");
        } else {
            text.push_str(&format!(" Steps: {}.", steps.join(", ")));
        }
        text
    }
}

fn display_name(step: &StepNarration) -> &str {
    if step.step_id.is_empty() {
        "unknown"
    } else {
        &step.step_id
    }
}

#[async_trait]
impl Narrator for LocalNarrator {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn analyze_step(&self, step: &StepNarration) -> Result<String> {
        Ok(Self::describe_step(step))
    }

    async fn recovery_suggestion(&self, step: &StepNarration) -> Result<String> {
        Ok(Self::recovery_for(step))
    }

    async fn improvements(&self, step: &StepNarration) -> Result<Vec<String>> {
        Ok(Self::improvements_for(step))
    }

    async fn explain_execution(&self, execution: &ExecutionNarration) -> Result<String> {
        Ok(Self::explain(execution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failed_validate() -> StepNarration {
        StepNarration {
            execution_id: Some("exec_1".to_string()),
            step_id: "validate".to_string(),
            step_data: json!({
                "status": "failed",
                "error": "Validation failed: Unsupported fileType: application/pdf",
                "logs": ["Step validate failed at t", "Reason: Validation failed"]
            }),
        }
    }

    #[test]
    fn test_describe_failed_step() {
        let text = LocalNarrator::describe_step(&failed_validate());
        assert!(text.starts_with("Step 'validate' is failed."));
        assert!(text.contains("Unsupported fileType"));
        assert!(text.ends_with("Reason: Validation failed"));
    }

    #[test]
    fn test_describe_is_deterministic() {
        let step = failed_validate();
        assert_eq!(LocalNarrator::describe_step(&step), LocalNarrator::describe_step(&step));
    }

    #[test]
    fn test_recovery_for_unsupported_type() {
        assert!(LocalNarrator::recovery_for(&failed_validate()).contains("supported format"));
    }

    #[test]
    fn test_recovery_without_error() {
        let step = StepNarration {
            step_id: "entry".to_string(),
            step_data: json!({"status": "completed"}),
            ..Default::default()
        };
        assert_eq!(
            LocalNarrator::recovery_for(&step),
            "Step 'entry' has not failed; no recovery is needed."
        );
    }

    #[test]
    fn test_explain_execution() {
        let execution = ExecutionNarration {
            execution_id: "exec_1".to_string(),
            record: json!({
                "status": "failed",
                "steps": [
                    {"name": "entry", "status": "completed"},
                    {"name": "validate", "status": "failed", "error": "bad"},
                    {"name": "process", "status": "skipped"}
                ]
            }),
            question: None,
        };
        assert_eq!(
            LocalNarrator::explain(&execution),
            "Execution exec_1 is failed. Steps: entry completed, validate failed (bad), process skipped."
        );
    }

    #[test]
    fn test_explain_rejected_execution() {
        let execution = ExecutionNarration {
            execution_id: "exec_r".to_string(),
            record: json!({"status": "rejected", "rejectionReason": "input must not be null"}),
            question: None,
        };
        assert!(LocalNarrator::explain(&execution).contains("rejected before any step ran"));
    }

    #[test]
    fn test_trait_matches_inherent_helpers() {
        let step = failed_validate();
        let narrator = LocalNarrator;

        let analysis = tokio_test::block_on(narrator.analyze_step(&step)).unwrap();
        let ideas = tokio_test::block_on(narrator.improvements(&step)).unwrap();

        assert_eq!(analysis, LocalNarrator::describe_step(&step));
        assert_eq!(ideas, LocalNarrator::improvements_for(&step));
        assert_eq!(narrator.name(), "local");
    }
}
