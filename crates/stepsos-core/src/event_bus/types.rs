use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Lifecycle events published while an execution runs.
///
/// The wire name (`step:complete`, ...) is what listeners and the event feed
/// see in [`StreamEvent::event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Execution admitted and moved to running
    ExecutionStarted,
    /// A declared step started
    StepStart,
    /// A declared step completed
    StepComplete,
    /// A declared step failed
    StepFailed,
    /// A declared step was skipped because an upstream step failed
    StepSkipped,
    /// Every declared step completed
    ExecutionComplete,
    /// The first step failure of an execution
    ExecutionFailed,
    /// The pre-flight contract gate refused the submission
    ExecutionRejected,
    /// Sent once by the event feed right after a client connects
    Connected,
}

impl EventKind {
    /// Wire name of the event
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution:started",
            Self::StepStart => "step:start",
            Self::StepComplete => "step:complete",
            Self::StepFailed => "step:failed",
            Self::StepSkipped => "step:skipped",
            Self::ExecutionComplete => "execution:complete",
            Self::ExecutionFailed => "execution:failed",
            Self::ExecutionRejected => "execution:rejected",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Tagged event delivered to bus listeners and, serialized, to feed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event discriminator, e.g. `step:complete`
    pub event: String,
    /// Event-specific payload (a JSON object)
    pub data: Value,
    /// Emission time
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// Build an event stamped with the current time
    #[must_use]
    pub fn now(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// `data.executionId`, when the payload carries one
    #[must_use]
    pub fn execution_id(&self) -> Option<&str> {
        self.data.get("executionId").and_then(Value::as_str)
    }
}

/// Failure reported by a listener. The bus drops the listener afterwards.
#[derive(Debug, Error)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

/// Something that wants every published [`StreamEvent`].
///
/// Delivery is synchronous on the publisher's task, so implementations must
/// not block. Returning an error (or panicking) unregisters the listener.
pub trait EventListener: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &StreamEvent) -> Result<(), ListenerError>;
}

impl<F> EventListener for F
where
    F: Fn(&StreamEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &StreamEvent) -> Result<(), ListenerError> {
        self(event)
    }
}
