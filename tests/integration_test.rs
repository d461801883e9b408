//! Integration tests for StepsOS
//!
//! These tests verify the integration between different crates:
//! - stepsos-core: gateway, runner, store and event bus working together
//! - stepsos-llm: narration of stored execution records

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use stepsos_core::{
    Error, EventBus, ExecutionGateway, ExecutionStatus, ExecutionStore, Pipeline, RunnerConfig,
    ShutdownController, StepRunner, StepStatus, StreamEvent, Submission,
};
use stepsos_llm::{ExecutionNarration, NarrationService};

fn gateway_with_delay(step_delay: Duration) -> (ExecutionGateway, Arc<ShutdownController>) {
    let shutdown = ShutdownController::new();
    let runner = StepRunner::new(
        Pipeline::default(),
        EventBus::new(),
        RunnerConfig { step_delay },
    );
    let gateway = ExecutionGateway::new(ExecutionStore::new(), runner, shutdown.clone());
    (gateway, shutdown)
}

fn upload(file_type: &str) -> Value {
    json!({
        "fileId": "f1",
        "fileName": "report",
        "fileSizeMB": 3,
        "fileType": file_type,
        "uploadedBy": "u1",
        "checksum": "c0ffee"
    })
}

fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<StreamEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = bus.subscribe(move |event: &StreamEvent| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    seen
}

/// Wait for every run to finish. A failed record is terminal before its
/// skipped steps are recorded, so the record status alone is not enough.
async fn wait_idle(gateway: &ExecutionGateway) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

// ============================================================================
// Pipeline scenarios
// ============================================================================

#[tokio::test]
async fn test_failed_upload_is_narrated_from_its_record() {
    let (gateway, _shutdown) = gateway_with_delay(Duration::ZERO);

    let id = gateway.submit_value(upload("application/pdf")).unwrap();
    wait_idle(&gateway).await;

    let record = gateway.store().get(&id).unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    let statuses: Vec<StepStatus> = record.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Completed, StepStatus::Failed, StepStatus::Skipped]
    );

    let narration = NarrationService::local_only();
    let text = narration
        .explain_execution(&ExecutionNarration {
            execution_id: id.clone(),
            record: serde_json::to_value(&record).unwrap(),
            question: None,
        })
        .await;
    assert!(text.starts_with(&format!("Execution {id} is failed.")));
    assert!(text.contains("Unsupported fileType: application/pdf"));
    assert!(text.contains("process skipped"));
}

#[tokio::test]
async fn test_rejected_submission_replays_as_rejected() {
    let (gateway, _shutdown) = gateway_with_delay(Duration::ZERO);

    let err = gateway
        .submit(Submission::from_value(json!({"input": []})))
        .unwrap_err();
    let Error::RejectedExecution { execution_id, reason } = err else {
        panic!("expected a rejection");
    };
    assert_eq!(reason, "input must be an object, not an array");

    let err = gateway.replay(&execution_id).unwrap_err();
    assert!(matches!(err, Error::RejectedExecution { .. }));
    assert_eq!(gateway.store().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executions_keep_their_own_event_order() {
    let (gateway, _shutdown) = gateway_with_delay(Duration::from_millis(1));
    let seen = record_events(gateway.runner().bus());

    let mut ids = Vec::new();
    for i in 0..30 {
        let file_type = if i % 3 == 0 { "application/pdf" } else { "text/csv" };
        ids.push(gateway.submit_value(upload(file_type)).unwrap());
    }
    wait_idle(&gateway).await;

    let mut per_execution: HashMap<String, Vec<String>> = HashMap::new();
    for event in seen.lock().unwrap().iter() {
        let id = event.execution_id().unwrap().to_string();
        per_execution.entry(id).or_default().push(event.event.clone());
    }

    assert_eq!(per_execution.len(), ids.len());
    for (i, id) in ids.iter().enumerate() {
        let events = &per_execution[id];
        assert_eq!(events.first().map(String::as_str), Some("execution:started"));
        if i % 3 == 0 {
            assert_eq!(events.last().map(String::as_str), Some("step:skipped"));
            assert!(events.contains(&"execution:failed".to_string()));
        } else {
            assert_eq!(events.last().map(String::as_str), Some("execution:complete"));
            assert_eq!(events.len(), 8);
        }
    }
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_refuses_new_work_and_drains_running_work() {
    let (gateway, shutdown) = gateway_with_delay(Duration::from_millis(50));

    let id = gateway.submit_value(upload("image/png")).unwrap();
    assert!(shutdown.begin());

    assert!(matches!(
        gateway.submit_value(upload("image/png")),
        Err(Error::ShuttingDown)
    ));
    assert!(gateway.drain(Duration::from_secs(5)).await);
    assert_eq!(
        gateway.store().get(&id).unwrap().status,
        ExecutionStatus::Completed
    );
    assert_eq!(gateway.in_flight(), 0);
}
