//! StepsOS Client - reconnecting event-feed subscriber
//!
//! [`StreamClient`] keeps one logical connection to the server's event feed
//! no matter how many local listeners subscribe, reconnects with exponential
//! backoff after abnormal closures and fans every event out to its listeners.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod transport;
pub mod ws;

pub use client::{ListenerHandle, StreamClient};
pub use config::StreamClientConfig;
pub use error::{Error, Result};
pub use event::{ConnectionState, StreamEvent};
pub use transport::{Connection, Frame, Transport};
pub use ws::WsTransport;
