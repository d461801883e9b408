use super::types::{EventListener, ListenerError, StreamEvent};
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

type ListenerId = u64;

#[derive(Default)]
struct Registry {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EventListener>)>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, ids: &[ListenerId]) -> usize {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(id, _)| !ids.contains(id));
        before - listeners.len()
    }
}

/// Publish/subscribe hub for lifecycle events.
///
/// Listeners are invoked synchronously, in registration order, on the
/// publishing task. The listener list is snapshotted before delivery, so a
/// listener may subscribe, unsubscribe or publish from inside its callback.
/// A listener that errors or panics is removed; the remaining listeners still
/// get the event. Nothing is buffered: publishing with no listeners drops the
/// event.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Keep the returned [`Subscription`] to deregister it.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: EventListener + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        trace!(listener_id = id, "Listener subscribed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a listener that forwards every event into an unbounded channel.
    ///
    /// Once the receiver is dropped the next publish fails for this listener
    /// and the bus removes it.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event: &StreamEvent| {
            tx.send(event.clone())
                .map_err(|_| ListenerError("receiver dropped".to_string()))
        });
        (subscription, rx)
    }

    /// Register a listener that forwards events into a channel holding at
    /// most `capacity` events.
    ///
    /// Publishing never waits on the consumer: while the channel is full,
    /// events for this listener are dropped and the listener stays
    /// registered. A dropped receiver removes it on the next publish.
    pub fn subscribe_bounded(
        &self,
        capacity: usize,
    ) -> (Subscription, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscription = self.subscribe(move |event: &StreamEvent| {
            match tx.try_send(event.clone()) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(dropped)) => {
                    warn!(event = %dropped.event, capacity, "Subscriber lagging, event dropped");
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => {
                    Err(ListenerError("receiver dropped".to_string()))
                }
            }
        });
        (subscription, rx)
    }

    /// Stamp and publish an event.
    ///
    /// Returns the number of listeners that accepted it.
    pub fn publish(&self, event: impl Into<String>, data: Value) -> usize {
        self.publish_event(StreamEvent::now(event, data))
    }

    /// Publish an already-built event.
    pub fn publish_event(&self, event: StreamEvent) -> usize {
        let snapshot: Vec<(ListenerId, Arc<dyn EventListener>)> = self
            .registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if snapshot.is_empty() {
            trace!(event = %event.event, "No listeners, event dropped");
            return 0;
        }

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(listener_id = id, event = %event.event, error = %e, "Listener failed, removing");
                    failed.push(id);
                }
                Err(_) => {
                    warn!(listener_id = id, event = %event.event, "Listener panicked, removing");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            self.registry.remove(&failed);
        }

        delivered
    }

    /// Number of registered listeners
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Capability to deregister a listener.
///
/// Dropping it leaves the listener registered.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Listener identifier
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister the listener.
    ///
    /// Returns `false` when it was already gone (removed after a failure, or
    /// the bus was dropped).
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&[self.id]) > 0,
            None => false,
        }
    }
}
