//! Events WebSocket handler
//!
//! Every connected client gets its own channel listener on the EventBus and
//! receives each lifecycle event as one JSON text frame.

use std::sync::Arc;

use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures_util::{sink::Sink, SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stepsos_core::{EventBus, EventKind, ShutdownController, StreamEvent};

/// Greeting sent right after the upgrade
pub const CONNECTED_MESSAGE: &str = "Connected to StepsOS";

/// Events queued per client before newer ones are dropped
const FEED_BUFFER: usize = 256;

/// WebSocket upgrade handler
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Extension(bus): Extension<EventBus>,
    Extension(shutdown): Extension<Arc<ShutdownController>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, bus, shutdown))
}

async fn send_event<S>(sender: &mut S, event: &StreamEvent) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(text) => sender.send(Message::Text(text)).await,
        Err(e) => {
            warn!(event = %event.event, error = %e, "Failed to serialize event");
            Ok(())
        }
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, bus: EventBus, shutdown: Arc<ShutdownController>) {
    let client_id = Uuid::new_v4();
    info!(%client_id, "Event feed connection established");

    let (mut sender, mut receiver) = socket.split();

    // Events published while the greeting is in flight queue up behind it
    let (subscription, mut events) = bus.subscribe_bounded(FEED_BUFFER);

    let connected = StreamEvent::now(
        EventKind::Connected,
        json!({ "message": CONNECTED_MESSAGE, "clientId": client_id }),
    );
    if send_event(&mut sender, &connected).await.is_err() {
        debug!(%client_id, "Client went away before the greeting");
        subscription.unsubscribe();
        return;
    }

    let stop = shutdown.token();

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = sender.send(Message::Close(Some(frame))).await;
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Err(e) = send_event(&mut sender, &event).await {
                    debug!(%client_id, error = %e, "Send failed, dropping client");
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%client_id, error = %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    subscription.unsubscribe();
    info!(%client_id, "Event feed connection ended");
}
