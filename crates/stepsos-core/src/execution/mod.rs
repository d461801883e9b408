//! ExecutionStore - the authoritative map from execution id to record.

/// Store, exclusive handle and list view
pub mod store;
/// Execution and step records
pub mod types;

pub use store::{ExecutionHandle, ExecutionList, ExecutionStore};
pub use types::{ExecutionRecord, ExecutionStatus, StepRecord, StepStatus, REJECTION_STEP_NAME};
