//! StreamClient - one logical connection, many listeners.
//!
//! ```text
//! disconnected -> connecting -> connected
//! connecting | connected -> error -> (reconnect scheduled) -> connecting
//! connected -> disconnected   (close code 1000 or disconnect())
//! ```

use crate::config::StreamClientConfig;
use crate::error::{Error, Result};
use crate::event::{ConnectionState, StreamEvent};
use crate::transport::{Connection, Frame, Transport, NORMAL_CLOSURE};
use crate::ws::WsTransport;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type EventCallback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;
type StateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

struct Listeners<T> {
    entries: Mutex<Vec<(u64, T)>>,
}

impl<T: Clone> Listeners<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Returns whether the set was empty before
    fn add(&self, id: u64, listener: T) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let was_empty = entries.is_empty();
        entries.push((id, listener));
        was_empty
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(i, _)| *i != id);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<T> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct Inner {
    config: StreamClientConfig,
    transport: Arc<dyn Transport>,
    state: watch::Sender<ConnectionState>,
    listeners: Listeners<EventCallback>,
    state_listeners: Listeners<StateCallback>,
    next_listener_id: AtomicU64,
    attempts: AtomicU32,
    /// Bumped by every connect attempt and by `disconnect`; a connection or
    /// attempt whose generation is stale must not touch state.
    generation: AtomicU64,
    connection: Mutex<Option<CancellationToken>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

/// Reconnecting event-feed subscriber.
///
/// Cheap to clone; clones share the connection and listener sets. Construct
/// one per process (or per test) and hand clones to consumers.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl StreamClient {
    /// Client over WebSocket
    #[must_use]
    pub fn new(config: StreamClientConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Client over a custom transport
    #[must_use]
    pub fn with_transport(config: StreamClientConfig, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state,
                listeners: Listeners::new(),
                state_listeners: Listeners::new(),
                next_listener_id: AtomicU64::new(0),
                attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                connection: Mutex::new(None),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &StreamClientConfig {
        &self.inner.config
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether the feed is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnect attempts made since the last successful connection
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Watch connection state changes
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Connect, or join the attempt already in flight.
    ///
    /// Resolves once connected. Fails on timeout or connect error, in which
    /// case a reconnect is scheduled per the backoff policy.
    pub async fn connect(&self) -> Result<()> {
        connect(&self.inner).await
    }

    /// Close the connection on purpose (code 1000).
    ///
    /// Cancels any pending reconnect and resets the attempt counter. No
    /// reconnect follows.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(task) = inner
            .reconnect_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        if let Some(token) = inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
        inner.attempts.store(0, Ordering::SeqCst);
        inner.set_state(ConnectionState::Disconnected);
        info!(url = %inner.config.url, "Disconnected by client");
    }

    /// Reset the reconnect counter so that a later failure may retry again
    pub fn reset_reconnect_attempts(&self) {
        self.inner.attempts.store(0, Ordering::SeqCst);
    }

    /// Register an event listener.
    ///
    /// The first listener triggers a connect when the client is
    /// disconnected. Dropping the handle keeps the listener; unsubscribing
    /// never closes the connection.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let first = self.inner.listeners.add(id, Arc::new(listener));

        if first && self.state() == ConnectionState::Disconnected {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let inner = self.inner.clone();
                    debug!("First subscriber, connecting");
                    runtime.spawn(async move {
                        if let Err(e) = connect(&inner).await {
                            debug!(error = %e, "Auto-connect failed");
                        }
                    });
                }
                Err(_) => warn!("No async runtime, subscriber will not auto-connect"),
            }
        }

        ListenerHandle {
            id,
            kind: ListenerKind::Event,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a connection-state listener. It is called immediately with
    /// the current state, then on every transition.
    pub fn subscribe_state<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: StateCallback = Arc::new(listener);
        self.inner.state_listeners.add(id, listener.clone());
        listener(self.state());

        ListenerHandle {
            id,
            kind: ListenerKind::State,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of event listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Event,
    State,
}

/// Capability to remove a listener
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    kind: ListenerKind,
    inner: Weak<Inner>,
}

impl ListenerHandle {
    /// Remove the listener. The connection stays open.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        match self.kind {
            ListenerKind::Event => inner.listeners.remove(self.id),
            ListenerKind::State => inner.state_listeners.remove(self.id),
        }
    }
}

impl Inner {
    /// Transition and notify; repeated states are not re-announced
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "Connection state changed");
            for listener in self.state_listeners.snapshot() {
                if catch_unwind(AssertUnwindSafe(|| listener(next))).is_err() {
                    warn!("State listener panicked");
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn dispatch(&self, text: &str) {
        let event: StreamEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                let err = Error::Parse(e.to_string());
                warn!(error = %err, "Dropping malformed event");
                return;
            }
        };

        for listener in self.listeners.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(event = %event.event, "Event listener panicked");
            }
        }
    }
}

async fn connect(inner: &Arc<Inner>) -> Result<()> {
    let started = inner.state.send_if_modified(|current| match current {
        ConnectionState::Connecting | ConnectionState::Connected => false,
        _ => {
            *current = ConnectionState::Connecting;
            true
        }
    });

    if !started {
        return join_in_flight(inner).await;
    }

    // send_if_modified already moved the state; announce it
    for listener in inner.state_listeners.snapshot() {
        if catch_unwind(AssertUnwindSafe(|| listener(ConnectionState::Connecting))).is_err() {
            warn!("State listener panicked");
        }
    }

    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let url = inner.config.url.clone();
    let timeout = inner.config.connect_timeout;
    info!(url = %url, "Connecting to event feed");

    let outcome = match tokio::time::timeout(timeout, inner.transport.open(&url)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
    };

    match outcome {
        Ok(mut connection) => {
            if !inner.is_current(generation) {
                let _ = connection.close(NORMAL_CLOSURE, "Client disconnect").await;
                return Err(Error::Closed);
            }

            let token = CancellationToken::new();
            *inner
                .connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
            inner.attempts.store(0, Ordering::SeqCst);
            inner.set_state(ConnectionState::Connected);
            info!(url = %url, "Connected to event feed");

            let reader = inner.clone();
            tokio::spawn(async move { read_loop(reader, connection, token, generation).await });
            Ok(())
        }
        Err(e) => {
            if !inner.is_current(generation) {
                return Err(Error::Closed);
            }
            warn!(url = %url, error = %e, "Connect attempt failed");
            inner.set_state(ConnectionState::Error);
            schedule_reconnect(inner);
            Err(e)
        }
    }
}

/// Wait for the attempt in flight to settle
async fn join_in_flight(inner: &Arc<Inner>) -> Result<()> {
    let mut rx = inner.state.subscribe();
    let timeout = inner.config.connect_timeout;
    let settled = tokio::time::timeout(
        timeout,
        rx.wait_for(|s| *s != ConnectionState::Connecting),
    )
    .await
    .map_err(|_| Error::Timeout(timeout.as_millis() as u64))?
    .map(|state| *state)
    .map_err(|_| Error::Closed)?;

    match settled {
        ConnectionState::Connected => Ok(()),
        ConnectionState::Disconnected => Err(Error::Closed),
        _ => Err(Error::Connection("connection attempt failed".to_string())),
    }
}

async fn read_loop(
    inner: Arc<Inner>,
    mut connection: Box<dyn Connection>,
    token: CancellationToken,
    generation: u64,
) {
    let close_code = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            frame = connection.next_frame() => Some(frame),
        };

        match next {
            None => {
                if let Err(e) = connection.close(NORMAL_CLOSURE, "Client disconnect").await {
                    debug!(error = %e, "Close handshake failed");
                }
                return;
            }
            Some(Some(Ok(Frame::Text(text)))) => inner.dispatch(&text),
            Some(Some(Ok(Frame::Close(code)))) => break code,
            Some(Some(Err(e))) => {
                warn!(error = %e, "Event feed read failed");
                break None;
            }
            Some(None) => break None,
        }
    };

    if !inner.is_current(generation) {
        return;
    }
    inner
        .connection
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if close_code == Some(NORMAL_CLOSURE) {
        info!("Event feed closed normally");
        inner.set_state(ConnectionState::Disconnected);
    } else {
        warn!(code = ?close_code, "Event feed closed abnormally");
        inner.set_state(ConnectionState::Error);
        schedule_reconnect(&inner);
    }
}

/// Plan the next attempt, or give up for good once the cap is reached
fn schedule_reconnect(inner: &Arc<Inner>) {
    let max = inner.config.max_attempts;
    let attempt = match inner
        .attempts
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
    {
        Ok(previous) => previous + 1,
        Err(_) => {
            let err = Error::ReconnectExhausted(max);
            error!(error = %err, "Giving up on event feed");
            inner.set_state(ConnectionState::Error);
            return;
        }
    };

    let delay = inner.config.backoff_delay(attempt);
    let generation = inner.generation.load(Ordering::SeqCst);
    info!(attempt, max_attempts = max, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

    let task_inner = inner.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !task_inner.is_current(generation) {
            return;
        }
        if let Err(e) = connect(&task_inner).await {
            debug!(attempt, error = %e, "Reconnect attempt failed");
        }
    });

    *inner
        .reconnect_task
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(task);
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
