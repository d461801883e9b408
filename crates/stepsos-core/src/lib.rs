//! StepsOS Core - execution tracking and event broadcast
//!
//! This crate provides:
//! - EventBus: fan-out of lifecycle events to any number of listeners
//! - ExecutionStore: in-memory registry of execution records
//! - Steps: the closed set of pipeline steps (entry, validate, process)
//! - StepRunner: the per-execution state machine
//! - ExecutionGateway: fire-and-forget submission with tracked tasks
//! - Graph: pipeline and lineage views
//! - Shutdown: graceful shutdown coordination

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod event_bus;
pub mod execution;
pub mod gateway;
pub mod graph;
pub mod runner;
pub mod shutdown;
pub mod steps;

pub use envelope::Submission;
pub use error::{Error, Result, StepError};
pub use event_bus::{EventBus, EventKind, EventListener, ListenerError, StreamEvent, Subscription};
pub use execution::{
    ExecutionHandle, ExecutionList, ExecutionRecord, ExecutionStatus, ExecutionStore, StepRecord,
    StepStatus,
};
pub use gateway::{new_execution_id, ExecutionGateway, DEFAULT_WORKFLOW_ID};
pub use graph::{lineage_graph, pipeline_graph, LineageGraph, PipelineGraph};
pub use runner::{RunnerConfig, StepRunner};
pub use shutdown::{wait_for_shutdown_signal, ShutdownController, ShutdownPhase};
pub use steps::{Pipeline, Step};
