//! EventBus - process-wide fan-out of execution lifecycle events.
//!
//! The step runner publishes here; the WebSocket feed and any in-process
//! observers subscribe.

/// Listener registry and delivery.
pub mod bus;
/// Event and listener type definitions.
pub mod types;

pub use bus::{EventBus, Subscription};
pub use types::{EventKind, EventListener, ListenerError, StreamEvent};
