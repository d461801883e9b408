//! Error types for stepsos-core
//!
//! Two layers: [`Error`] is what callers of the store and gateway see,
//! [`StepError`] is what a single step reports back to the runner.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Pre-flight contract violation, no step ran
    #[error("execution {execution_id} rejected: {reason}")]
    RejectedExecution {
        /// Identifier of the rejected execution
        execution_id: String,
        /// Human-readable reason
        reason: String,
    },

    /// An execution with this id already exists
    #[error("duplicate execution id: {0}")]
    DuplicateExecution(String),

    /// Unknown execution or step
    #[error("not found: {0}")]
    NotFound(String),

    /// A step failed
    #[error("step error: {0}")]
    Step(#[from] StepError),

    /// A pipeline declares the same step name twice
    #[error("duplicate step name in pipeline: {0}")]
    DuplicateStep(String),

    /// The gateway no longer accepts work
    #[error("shutting down, submission refused")]
    ShuttingDown,

    /// Internal error (lock poisoning, serialization)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by an individual step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// One or more field rules were violated; every violation is listed
    #[error("Validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    /// A step's structural precondition on its input was not met
    #[error("{step} requires {requirement}")]
    ContractViolation {
        /// Step that detected the violation
        step: String,
        /// What the step expected from upstream
        requirement: String,
    },

    /// Any other execution failure
    #[error("{0}")]
    Execution(String),
}

impl StepError {
    /// Short machine-readable kind, used in event payloads and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::ContractViolation { .. } => "contract_violation",
            Self::Execution(_) => "execution",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
