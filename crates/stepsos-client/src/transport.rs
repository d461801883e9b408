//! Socket abstraction used by the client

use crate::error::Result;
use async_trait::async_trait;

/// Close code for a normal, intentional closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text message
    Text(String),
    /// Peer closed, with its close code when it sent one
    Close(Option<u16>),
}

/// One open duplex connection
#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame. `None` once the stream ended.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Close with `code`
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Opens connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `url`
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>>;
}
