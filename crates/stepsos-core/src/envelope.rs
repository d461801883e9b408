//! Submission envelope: the accepted request shapes, routed by key presence.

use serde_json::Value;

/// What a caller may submit
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// `{executionId?, workflowId?, input}`
    Workflow {
        /// Caller-chosen id
        execution_id: Option<String>,
        /// Workflow name, defaulted when absent
        workflow_id: Option<String>,
        /// Payload handed to the first step
        input: Value,
    },
    /// `{replay: true, executionId}`: rerun a stored execution's input
    Replay {
        /// Execution whose input is replayed
        execution_id: String,
    },
    /// Anything else, used as the payload itself
    Bare(Value),
}

impl Submission {
    /// Route a JSON body to a submission kind.
    ///
    /// Order: an object with an `input` key is a workflow envelope; an object
    /// with `replay: true` and a string `executionId` is a replay; everything
    /// else (including `null`) is a bare payload.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::Bare(value);
        };

        if map.contains_key("input") {
            let input = map.remove("input").unwrap_or(Value::Null);
            return Self::Workflow {
                execution_id: map.get("executionId").and_then(id_text),
                workflow_id: map.get("workflowId").and_then(workflow_text),
                input,
            };
        }

        if map.get("replay") == Some(&Value::Bool(true)) {
            if let Some(Value::String(id)) = map.get("executionId") {
                return Self::Replay {
                    execution_id: id.clone(),
                };
            }
        }

        Self::Bare(Value::Object(map))
    }

    /// Replay submission for `execution_id`
    #[must_use]
    pub fn replay(execution_id: impl Into<String>) -> Self {
        Self::Replay {
            execution_id: execution_id.into(),
        }
    }
}

impl From<Value> for Submission {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Ids may be strings or numbers; `null` means absent
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A non-string workflow id becomes empty so the contract gate rejects it
fn workflow_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        _ => Some(String::new()),
    }
}
