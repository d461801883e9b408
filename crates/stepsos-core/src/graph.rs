//! Derived graph views for the dashboard.

use crate::execution::{ExecutionRecord, ExecutionStatus, StepStatus};
use crate::steps::Pipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NODE_X: u32 = 400;
const NODE_Y_START: u32 = 100;
const NODE_Y_STEP: u32 = 120;

/// Directed edge between two step nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Upstream step
    pub from: String,
    /// Downstream step
    pub to: String,
}

/// One declared step laid out for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Step name
    pub id: String,
    /// `entry` for the first step, `workflow` otherwise
    #[serde(rename = "type")]
    pub kind: String,
    /// Status in the latest execution
    pub status: StepStatus,
    /// Horizontal position
    pub x: u32,
    /// Vertical position
    pub y: u32,
}

/// Node/edge view of the declared pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
    /// One node per declared step
    pub nodes: Vec<GraphNode>,
    /// Consecutive step pairs
    pub edges: Vec<GraphEdge>,
}

/// Build the pipeline view, colouring nodes with `latest`'s step statuses
#[must_use]
pub fn pipeline_graph(pipeline: &Pipeline, latest: Option<&ExecutionRecord>) -> PipelineGraph {
    let names: Vec<&str> = pipeline.names().collect();

    let nodes = names
        .iter()
        .zip(0u32..)
        .map(|(name, index)| GraphNode {
            id: (*name).to_string(),
            kind: if index == 0 { "entry" } else { "workflow" }.to_string(),
            status: latest
                .and_then(|record| record.step(name))
                .map_or(StepStatus::Pending, |step| step.status),
            x: NODE_X,
            y: NODE_Y_START + NODE_Y_STEP * index,
        })
        .collect();

    PipelineGraph {
        nodes,
        edges: chain(names.iter().copied()),
    }
}

/// A step record exposed as a lineage node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    /// Step name
    pub id: String,
    /// Step status
    pub status: StepStatus,
    /// Recorded input
    pub input: Option<Value>,
    /// Recorded output
    pub output: Option<Value>,
    /// Failure message
    pub error: Option<String>,
    /// Log lines
    pub logs: Vec<String>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-execution lineage: what each step saw and produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageGraph {
    /// Execution id
    pub execution_id: String,
    /// Execution status
    pub status: ExecutionStatus,
    /// One node per step record
    pub nodes: Vec<LineageNode>,
    /// Consecutive recorded steps
    pub edges: Vec<GraphEdge>,
}

/// Build the lineage view of one execution
#[must_use]
pub fn lineage_graph(record: &ExecutionRecord) -> LineageGraph {
    let nodes = record
        .steps
        .iter()
        .map(|step| LineageNode {
            id: step.name.clone(),
            status: step.status,
            input: step.input.clone(),
            output: step.output.clone(),
            error: step.error.clone(),
            logs: step.logs.clone(),
            started_at: step.started_at,
            completed_at: step.completed_at,
        })
        .collect();

    LineageGraph {
        execution_id: record.id.clone(),
        status: record.status,
        nodes,
        edges: chain(record.steps.iter().map(|s| s.name.as_str())),
    }
}

fn chain<'a>(names: impl Iterator<Item = &'a str>) -> Vec<GraphEdge> {
    let names: Vec<&str> = names.collect();
    names
        .windows(2)
        .map(|pair| GraphEdge {
            from: pair[0].to_string(),
            to: pair[1].to_string(),
        })
        .collect()
}
