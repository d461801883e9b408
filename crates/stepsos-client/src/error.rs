//! Error types for stepsos-client

use thiserror::Error;

/// Client error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Could not establish the connection
    #[error("connection error: {0}")]
    Connection(String),

    /// Connect attempt timed out
    #[error("connect timeout after {0}ms")]
    Timeout(u64),

    /// Send or receive failed on an open connection
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound message was not a valid event
    #[error("parse error: {0}")]
    Parse(String),

    /// Reconnection gave up
    #[error("reconnect attempts exhausted after {0} attempts")]
    ReconnectExhausted(u32),

    /// The client was disconnected while the operation was pending
    #[error("connection closed")]
    Closed,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
