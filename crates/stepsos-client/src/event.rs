//! Inbound event and connection state types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An event received from the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event discriminator, e.g. `step:complete`
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub data: Value,
    /// Emission time as sent by the server
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl StreamEvent {
    /// `data.executionId`, when present
    #[must_use]
    pub fn execution_id(&self) -> Option<&str> {
        self.data.get("executionId").and_then(Value::as_str)
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection and none being attempted
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Connected and receiving
    Connected,
    /// Last attempt or connection failed
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
