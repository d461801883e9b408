//! StreamClient against a real WebSocket server

use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepsos_client::{ConnectionState, StreamClient, StreamClientConfig};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_receives_events_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let release = Arc::new(Notify::new());
    let server_release = release.clone();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"event":"connected","data":{"message":"Connected to StepsOS"},"timestamp":"2025-01-01T00:00:00Z"}"#
                .to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"event":"step:complete","data":{"executionId":"exec_1","stepId":"entry"},"timestamp":"2025-01-01T00:00:01Z"}"#
                .to_string(),
        ))
        .await
        .unwrap();
        server_release.notified().await;
        // Read until the client's close frame arrives
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Close(frame) = msg {
                return frame.map(|f| u16::from(f.code));
            }
        }
        None
    });

    let client = StreamClient::new(StreamClientConfig::new(format!("ws://{addr}/ws")));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _handle = client.subscribe(move |e| sink.lock().unwrap().push(e.event.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["connected", "step:complete"]);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect();
    release.notify_one();
    let close_code = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(close_code, Some(1000));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_refused_connection_reports_error_state() {
    // Bind then drop to get a port with nothing listening
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = StreamClientConfig::new(format!("ws://{addr}/ws")).with_max_attempts(0);
    let client = StreamClient::new(config);

    assert!(client.connect().await.is_err());
    assert_eq!(client.state(), ConnectionState::Error);
}
