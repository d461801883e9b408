//! StepRunner - drives one execution through the declared pipeline.
//!
//! The runner is the only writer of an execution record after creation. Every
//! record mutation is followed by its event on the same task, so events for
//! one execution are published in mutation order.

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, EventKind};
use crate::execution::{
    ExecutionHandle, ExecutionStatus, StepRecord, StepStatus, REJECTION_STEP_NAME,
};
use crate::steps::Pipeline;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Simulated delay after each completed step
    pub step_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(1000),
        }
    }
}

/// Executes the pipeline against execution records
#[derive(Debug, Clone)]
pub struct StepRunner {
    pipeline: Arc<Pipeline>,
    bus: EventBus,
    config: RunnerConfig,
}

impl StepRunner {
    /// Create a runner publishing on `bus`
    #[must_use]
    pub fn new(pipeline: Pipeline, bus: EventBus, config: RunnerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            bus,
            config,
        }
    }

    /// Declared pipeline
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Event bus the runner publishes on
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Pre-flight contract gate.
    ///
    /// Checks the envelope once before any step. On violation the record is
    /// moved to `rejected` with a single synthetic `execution` step record,
    /// `execution:rejected` is published and [`Error::RejectedExecution`] is
    /// returned.
    pub fn admit(&self, handle: &ExecutionHandle) -> Result<()> {
        self.admit_as(handle, handle.id())
    }

    /// Contract gate for a record stored under a different id than the one
    /// submitted. The id rule is checked against `requested_id`.
    pub fn admit_as(&self, handle: &ExecutionHandle, requested_id: &str) -> Result<()> {
        let violations = handle.read(|record| {
            if record.status != ExecutionStatus::Pending {
                return Err(Error::Internal(format!(
                    "execution {} is {}, expected pending",
                    record.id, record.status
                )));
            }
            Ok(contract_violations(
                requested_id,
                &record.workflow_id,
                &record.input,
            ))
        })??;

        if violations.is_empty() {
            return Ok(());
        }

        let reason = violations.join("; ");
        let now = Utc::now().to_rfc3339();
        handle.update(|record| {
            record.rejection_reason = Some(reason.clone());
            record.steps.push(StepRecord::failed(
                REJECTION_STEP_NAME,
                reason.clone(),
                vec![
                    format!("Execution rejected at {now}"),
                    format!("Reason: {reason}"),
                ],
            ));
            record.finish(ExecutionStatus::Rejected);
        })?;

        warn!(execution_id = %handle.id(), reason = %reason, "Execution rejected");
        self.bus.publish(
            EventKind::ExecutionRejected,
            json!({ "executionId": handle.id(), "reason": reason }),
        );

        Err(Error::RejectedExecution {
            execution_id: handle.id().to_string(),
            reason,
        })
    }

    /// Run every declared step in order and return the terminal status.
    ///
    /// Step failures never surface as errors here: they become step and
    /// execution state plus events. `Err` only means the record could not be
    /// written.
    #[instrument(skip(self, handle), fields(execution_id = %handle.id()))]
    pub async fn execute(&self, handle: ExecutionHandle) -> Result<ExecutionStatus> {
        let (workflow_id, mut current) = handle.update(|record| {
            record.status = ExecutionStatus::Running;
            (record.workflow_id.clone(), record.input.clone())
        })?;
        let id = handle.id().to_string();

        info!(workflow_id = %workflow_id, steps = self.pipeline.len(), "Execution started");
        self.bus.publish(
            EventKind::ExecutionStarted,
            json!({ "executionId": id, "workflowId": workflow_id }),
        );

        let mut failed_step: Option<&'static str> = None;

        for step in self.pipeline.steps() {
            let name = step.name();

            if let Some(upstream) = failed_step {
                let reason = format!("Skipped: upstream step '{upstream}' failed");
                handle.update(|record| {
                    record
                        .steps
                        .push(StepRecord::skipped(name, reason.clone()));
                })?;
                debug!(step = name, upstream, "Step skipped");
                self.bus.publish(
                    EventKind::StepSkipped,
                    json!({
                        "executionId": id,
                        "stepId": name,
                        "upstream": upstream,
                        "reason": reason,
                    }),
                );
                continue;
            }

            handle.update(|record| {
                record
                    .steps
                    .push(StepRecord::running(name, current.clone()));
            })?;
            debug!(step = name, "Step started");
            self.bus.publish(
                EventKind::StepStart,
                json!({ "executionId": id, "stepId": name, "input": current }),
            );

            match step.run(current.clone()).await {
                Ok(output) => {
                    let now = Utc::now();
                    handle.update(|record| {
                        if let Some(rec) = record.steps.last_mut() {
                            rec.status = StepStatus::Completed;
                            rec.output = Some(output.clone());
                            rec.logs.push(format!("Step {name} completed at {}", now.to_rfc3339()));
                            rec.completed_at = Some(now);
                        }
                    })?;
                    info!(step = name, "Step completed");
                    self.bus.publish(
                        EventKind::StepComplete,
                        json!({ "executionId": id, "stepId": name, "output": output }),
                    );
                    current = output;

                    if !self.config.step_delay.is_zero() {
                        tokio::time::sleep(self.config.step_delay).await;
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    let now = Utc::now();
                    handle.update(|record| {
                        if let Some(rec) = record.steps.last_mut() {
                            rec.status = StepStatus::Failed;
                            rec.error = Some(message.clone());
                            rec.logs
                                .push(format!("Step {name} failed at {}", now.to_rfc3339()));
                            rec.logs.push(format!("Reason: {message}"));
                            rec.completed_at = Some(now);
                        }
                        record.finish(ExecutionStatus::Failed);
                    })?;
                    warn!(step = name, kind = e.kind(), error = %message, "Step failed");
                    self.bus.publish(
                        EventKind::StepFailed,
                        json!({ "executionId": id, "stepId": name, "error": message }),
                    );
                    self.bus.publish(
                        EventKind::ExecutionFailed,
                        json!({ "executionId": id, "stepId": name, "error": message }),
                    );
                    failed_step = Some(name);
                }
            }
        }

        if failed_step.is_some() {
            info!("Execution failed");
            return Ok(ExecutionStatus::Failed);
        }

        handle.update(|record| record.finish(ExecutionStatus::Completed))?;
        info!("Execution completed");
        self.bus.publish(
            EventKind::ExecutionComplete,
            json!({ "executionId": id, "status": ExecutionStatus::Completed }),
        );
        Ok(ExecutionStatus::Completed)
    }

    /// Contract gate followed by the step loop
    pub async fn run(&self, handle: ExecutionHandle) -> Result<ExecutionStatus> {
        self.admit(&handle)?;
        self.execute(handle).await
    }
}

/// Envelope rules checked by the contract gate
fn contract_violations(id: &str, workflow_id: &str, input: &Value) -> Vec<String> {
    let mut violations = Vec::new();
    if id.trim().is_empty() {
        violations.push("executionId must be a non-empty string".to_string());
    }
    if workflow_id.trim().is_empty() {
        violations.push("workflowId must be a non-empty string".to_string());
    }
    match input {
        Value::Object(_) => {}
        Value::Null => violations.push("input must not be null".to_string()),
        Value::Array(_) => violations.push("input must be an object, not an array".to_string()),
        _ => violations.push("input must be an object".to_string()),
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStore;
    use crate::steps::{ProcessStep, Step};
    use crate::StreamEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn runner(pipeline: Pipeline) -> (StepRunner, UnboundedReceiver<StreamEvent>) {
        let bus = EventBus::new();
        // Dropping the subscription keeps the listener registered
        let (_subscription, rx) = bus.subscribe_channel();
        let config = RunnerConfig {
            step_delay: Duration::ZERO,
        };
        (StepRunner::new(pipeline, bus, config), rx)
    }

    fn valid_upload() -> Value {
        json!({
            "fileId": "f1",
            "fileName": "a.png",
            "fileSizeMB": 2.5,
            "fileType": "image/png",
            "uploadedBy": "u1",
            "checksum": "abc"
        })
    }

    fn drain(rx: &mut UnboundedReceiver<StreamEvent>) -> Vec<(String, Option<String>)> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            let step = e.data.get("stepId").and_then(Value::as_str).map(str::to_string);
            events.push((e.event, step));
        }
        events
    }

    #[tokio::test]
    async fn test_successful_run() {
        let (runner, mut rx) = runner(Pipeline::default());
        let store = ExecutionStore::new();
        let handle = store.create("exec_ok", "wf", valid_upload()).unwrap();

        let status = runner.run(handle).await.unwrap();
        assert_eq!(status, ExecutionStatus::Completed);

        let record = store.get("exec_ok").unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.completed_at.is_some());
        let names: Vec<&str> = record.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "validate", "process"]);
        assert!(record.steps.iter().all(|s| s.status == StepStatus::Completed));

        let artifact = record.step("process").unwrap().output.as_ref().unwrap();
        assert!(artifact["artifactId"].as_str().unwrap().starts_with("artifact_"));

        // validate receives entry's whole output
        let validate_input = record.step("validate").unwrap().input.as_ref().unwrap();
        assert_eq!(validate_input, record.step("entry").unwrap().output.as_ref().unwrap());

        let events = drain(&mut rx);
        let s = |n: &str| Some(n.to_string());
        assert_eq!(
            events,
            vec![
                ("execution:started".to_string(), None),
                ("step:start".to_string(), s("entry")),
                ("step:complete".to_string(), s("entry")),
                ("step:start".to_string(), s("validate")),
                ("step:complete".to_string(), s("validate")),
                ("step:start".to_string(), s("process")),
                ("step:complete".to_string(), s("process")),
                ("execution:complete".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_validation_failure_skips_downstream() {
        let (runner, mut rx) = runner(Pipeline::default());
        let store = ExecutionStore::new();
        let mut input = valid_upload();
        input["fileType"] = json!("application/pdf");
        let handle = store.create("exec_pdf", "wf", input).unwrap();

        let status = runner.run(handle).await.unwrap();
        assert_eq!(status, ExecutionStatus::Failed);

        let record = store.get("exec_pdf").unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.steps.len(), 3);

        let validate = record.step("validate").unwrap();
        assert_eq!(validate.status, StepStatus::Failed);
        assert!(validate.error.as_ref().unwrap().contains("Unsupported fileType"));
        assert!(validate.output.is_none());
        assert_eq!(validate.logs.len(), 2);
        assert!(validate.logs[1].starts_with("Reason: Validation failed"));

        let process = record.step("process").unwrap();
        assert_eq!(process.status, StepStatus::Skipped);
        assert!(process.logs[0].contains("'validate'"));

        let events: Vec<String> = drain(&mut rx).into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            events,
            vec![
                "execution:started",
                "step:start",
                "step:complete",
                "step:start",
                "step:failed",
                "execution:failed",
                "step:skipped",
            ]
        );
    }

    #[tokio::test]
    async fn test_null_input_is_rejected() {
        let (runner, mut rx) = runner(Pipeline::default());
        let store = ExecutionStore::new();
        let handle = store.create("exec_null", "wf", Value::Null).unwrap();

        let err = runner.run(handle).await.unwrap_err();
        assert!(matches!(err, Error::RejectedExecution { ref execution_id, .. } if execution_id == "exec_null"));

        let record = store.get("exec_null").unwrap();
        assert_eq!(record.status, ExecutionStatus::Rejected);
        assert_eq!(record.rejection_reason.as_deref(), Some("input must not be null"));
        assert_eq!(record.steps.len(), 1);
        assert_eq!(record.steps[0].name, "execution");
        assert_eq!(record.steps[0].status, StepStatus::Failed);

        let events = drain(&mut rx);
        assert_eq!(events, vec![("execution:rejected".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_gate_checks_every_envelope_rule() {
        let (runner, _rx) = runner(Pipeline::default());
        let store = ExecutionStore::new();

        let handle = store.create("exec_arr", "", json!([1, 2])).unwrap();
        let err = runner.admit(&handle).unwrap_err();
        assert_eq!(
            err.to_string(),
            "execution exec_arr rejected: workflowId must be a non-empty string; \
             input must be an object, not an array"
        );

        let handle = store.create(" ", "wf", json!({})).unwrap();
        assert!(runner.admit(&handle).is_err());
    }

    #[tokio::test]
    async fn test_admit_refuses_non_pending_record() {
        let (runner, _rx) = runner(Pipeline::default());
        let store = ExecutionStore::new();
        let handle = store.create("exec_1", "wf", json!({})).unwrap();
        handle.update(|r| r.status = ExecutionStatus::Running).unwrap();

        assert!(matches!(runner.admit(&handle), Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_process_checks_its_own_precondition() {
        // No validate step: the first step is never skipped, so process runs
        // and must catch the missing marker itself.
        let (runner, _rx) = runner(Pipeline::new(vec![Step::Process(ProcessStep)]).unwrap());
        let store = ExecutionStore::new();
        let handle = store.create("exec_p", "wf", valid_upload()).unwrap();

        assert_eq!(runner.run(handle).await.unwrap(), ExecutionStatus::Failed);
        let record = store.get("exec_p").unwrap();
        assert_eq!(
            record.steps[0].error.as_deref(),
            Some("process requires validated input (validation.status == \"passed\")")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_delay_is_applied() {
        let bus = EventBus::new();
        let config = RunnerConfig {
            step_delay: Duration::from_secs(1),
        };
        let runner = StepRunner::new(Pipeline::default(), bus, config);
        let store = ExecutionStore::new();
        let handle = store.create("exec_d", "wf", valid_upload()).unwrap();

        let started = tokio::time::Instant::now();
        runner.run(handle).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
