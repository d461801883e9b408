use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the synthetic step record appended when the contract gate rejects
/// a submission
pub const REJECTION_STEP_NAME: &str = "execution";

/// Execution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created, not yet admitted
    Pending,
    /// Steps are running
    Running,
    /// Every declared step completed
    Completed,
    /// A declared step failed
    Failed,
    /// Refused by the contract gate, no step ran
    Rejected,
}

impl ExecutionStatus {
    /// Terminal statuses never change again
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not reached yet (only used by derived views)
    Pending,
    /// Executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Not executed because an upstream step failed
    Skipped,
}

impl StepStatus {
    /// Terminal statuses are never revisited
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one declared step of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Declared step name
    pub name: String,
    /// Current status
    pub status: StepStatus,
    /// Value handed to the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Value the step returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure message, only when `status == failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable log lines, append-only
    #[serde(default)]
    pub logs: Vec<String>,
    /// When the step started (or was skipped)
    pub started_at: DateTime<Utc>,
    /// When the step reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// A step that is about to run
    #[must_use]
    pub fn running(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Running,
            input: Some(input),
            output: None,
            error: None,
            logs: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A step that will not run
    #[must_use]
    pub fn skipped(name: impl Into<String>, log: String) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            input: None,
            output: None,
            error: None,
            logs: vec![log],
            started_at: now,
            completed_at: Some(now),
        }
    }

    /// A step that failed without running (the synthetic rejection record)
    #[must_use]
    pub fn failed(name: impl Into<String>, error: String, logs: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status: StepStatus::Failed,
            input: None,
            output: None,
            error: Some(error),
            logs,
            started_at: now,
            completed_at: Some(now),
        }
    }
}

/// One run of the step pipeline against one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Unique execution id
    pub id: String,
    /// Workflow the submission named
    pub workflow_id: String,
    /// Current status
    pub status: ExecutionStatus,
    /// Submitted payload, never modified
    pub input: Value,
    /// Step records in declared order
    pub steps: Vec<StepRecord>,
    /// Why the contract gate refused the submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When a terminal status was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Fresh pending record
    #[must_use]
    pub fn new(id: impl Into<String>, workflow_id: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            input,
            steps: Vec::new(),
            rejection_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record of the named step, if any
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Mutable record of the named step
    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// Move to a terminal status. A record that is already terminal is left
    /// untouched and `false` is returned.
    pub fn finish(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }
}
