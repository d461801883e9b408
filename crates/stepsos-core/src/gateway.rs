//! ExecutionGateway - the single entry point for starting runs.

use crate::envelope::Submission;
use crate::error::{Error, Result};
use crate::execution::ExecutionStore;
use crate::runner::StepRunner;
use crate::shutdown::ShutdownController;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Workflow id used when a submission names none
pub const DEFAULT_WORKFLOW_ID: &str = "file_upload_flow";

/// Fresh execution id, `exec_<uuid>`
#[must_use]
pub fn new_execution_id() -> String {
    format!("exec_{}", Uuid::new_v4().simple())
}

/// Accepts submissions, records them and schedules their runs.
///
/// Runs are spawned on a [`TaskTracker`] owned by the gateway: the caller
/// never awaits them, but each task is kept alive until its execution is
/// terminal and can be drained at shutdown.
#[derive(Debug, Clone)]
pub struct ExecutionGateway {
    store: ExecutionStore,
    runner: StepRunner,
    tracker: TaskTracker,
    shutdown: Arc<ShutdownController>,
    default_workflow_id: String,
}

impl ExecutionGateway {
    /// Create a gateway
    #[must_use]
    pub fn new(
        store: ExecutionStore,
        runner: StepRunner,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            store,
            runner,
            tracker: TaskTracker::new(),
            shutdown,
            default_workflow_id: DEFAULT_WORKFLOW_ID.to_string(),
        }
    }

    /// Override the workflow id used for submissions that name none
    #[must_use]
    pub fn with_default_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.default_workflow_id = workflow_id.into();
        self
    }

    /// Backing store
    #[must_use]
    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    /// Runner used for every execution
    #[must_use]
    pub fn runner(&self) -> &StepRunner {
        &self.runner
    }

    /// Submit work and return its execution id without waiting for the run.
    ///
    /// The id is already in the store when this returns. The contract gate
    /// runs here, so a rejected submission is stored as `rejected` and
    /// reported as [`Error::RejectedExecution`]; no task is spawned for it.
    pub fn submit(&self, submission: Submission) -> Result<String> {
        if !self.shutdown.is_accepting_work() {
            return Err(Error::ShuttingDown);
        }

        let (execution_id, workflow_id, input) = match submission {
            Submission::Workflow {
                execution_id,
                workflow_id,
                input,
            } => (execution_id, workflow_id, input),
            Submission::Replay { execution_id } => {
                let original = self.store.get(&execution_id)?;
                info!(replay_of = %execution_id, "Replaying execution");
                (None, Some(original.workflow_id), original.input)
            }
            Submission::Bare(payload) => (None, None, payload),
        };

        let requested = execution_id.unwrap_or_else(new_execution_id);
        // A blank id cannot key the store; its rejection is kept under a fresh one
        let id = if requested.trim().is_empty() {
            new_execution_id()
        } else {
            requested.clone()
        };
        let workflow_id = workflow_id.unwrap_or_else(|| self.default_workflow_id.clone());
        let handle = self.store.create(id.clone(), workflow_id, input)?;

        self.runner.admit_as(&handle, &requested)?;

        let runner = self.runner.clone();
        self.tracker.spawn(async move {
            let id = handle.id().to_string();
            if let Err(e) = runner.execute(handle).await {
                error!(execution_id = %id, error = %e, "Execution aborted");
            }
        });
        info!(execution_id = %id, "Execution accepted");

        Ok(id)
    }

    /// Submit a raw JSON body
    pub fn submit_value(&self, body: Value) -> Result<String> {
        self.submit(Submission::from_value(body))
    }

    /// Rerun a stored execution's input under a fresh id
    pub fn replay(&self, execution_id: &str) -> Result<String> {
        self.submit(Submission::replay(execution_id))
    }

    /// Runs that have not reached a terminal state
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop tracking new runs and wait for in-flight ones.
    ///
    /// Returns `true` when every run finished within `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(in_flight = pending, "Waiting for in-flight executions");
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    in_flight = self.tracker.len(),
                    timeout_secs = timeout.as_secs(),
                    "Drain timeout exceeded"
                );
                false
            }
        }
    }
}
