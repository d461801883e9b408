//! Prompt templates for remote narrators

use crate::narrator::{ExecutionNarration, StepNarration};

/// System prompt shared by every request
pub const SYSTEM_PROMPT: &str =
    "You are an AI that explains backend execution pipelines. Be concise and technical.";

const ANALYZE_STEP: &str = "Explain what happened in this pipeline step, in two or three sentences.";

const RECOVERY: &str = "This pipeline step failed. Give one concrete action that would fix it.";

const IMPROVEMENTS: &str =
    "Suggest up to three improvements for this pipeline step, one per line, without numbering.";

const EXPLAIN_EXECUTION: &str = "Explain this execution: which steps ran, their status, \
how data flowed between them and what a user should do next.";

fn step_context(step: &StepNarration) -> String {
    let data = serde_json::to_string_pretty(&step.step_data).unwrap_or_default();
    format!("Step: {}\nStep data:\n{data}", step.step_id)
}

/// User prompt for a step analysis
#[must_use]
pub fn analyze_step(step: &StepNarration) -> String {
    format!("{ANALYZE_STEP}\n\n{}", step_context(step))
}

/// User prompt for a recovery suggestion
#[must_use]
pub fn recovery(step: &StepNarration) -> String {
    format!("{RECOVERY}\n\n{}", step_context(step))
}

/// User prompt for improvement suggestions
#[must_use]
pub fn improvements(step: &StepNarration) -> String {
    format!("{IMPROVEMENTS}\n\n{}", step_context(step))
}

/// User prompt for an execution explanation
#[must_use]
pub fn explain_execution(execution: &ExecutionNarration) -> String {
    let record = serde_json::to_string_pretty(&execution.record).unwrap_or_default();
    let question = execution.question.as_deref().unwrap_or(EXPLAIN_EXECUTION);
    format!("{question}\n\nExecution:\n{record}")
}
