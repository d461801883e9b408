use super::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the next `open` call does
enum Script {
    Refuse,
    Accept(mpsc::UnboundedReceiver<Frame>),
    AcceptAfter(Duration, mpsc::UnboundedReceiver<Frame>),
}

/// In-memory transport driven by a script; unscripted opens are refused
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    opens: Mutex<Vec<Instant>>,
    closes: Arc<Mutex<Vec<u16>>>,
}

impl ScriptedTransport {
    fn push(&self, step: Script) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Script an accepted connection and return its server-side sender
    fn accept(&self) -> mpsc::UnboundedSender<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Accept(rx));
        tx
    }

    fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    fn open_gaps_ms(&self) -> Vec<u64> {
        let opens = self.opens.lock().unwrap();
        opens
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis() as u64)
            .collect()
    }
}

struct FakeConnection {
    frames: mpsc::UnboundedReceiver<Frame>,
    closes: Arc<Mutex<Vec<u16>>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<()> {
        self.closes.lock().unwrap().push(code);
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _url: &str) -> Result<Box<dyn Connection>> {
        self.opens.lock().unwrap().push(Instant::now());
        let step = self.script.lock().unwrap().pop_front();
        let frames = match step {
            None | Some(Script::Refuse) => {
                return Err(Error::Connection("connection refused".to_string()))
            }
            Some(Script::Accept(rx)) => rx,
            Some(Script::AcceptAfter(delay, rx)) => {
                tokio::time::sleep(delay).await;
                rx
            }
        };
        Ok(Box::new(FakeConnection {
            frames,
            closes: self.closes.clone(),
        }))
    }
}

fn client(max_attempts: u32) -> (StreamClient, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::default());
    let config = StreamClientConfig::new("ws://test/ws").with_max_attempts(max_attempts);
    (
        StreamClient::with_transport(config, transport.clone()),
        transport,
    )
}

fn record_states(client: &StreamClient) -> Arc<Mutex<Vec<ConnectionState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    let _handle = client.subscribe_state(move |s| sink.lock().unwrap().push(s));
    states
}

fn event_json(event: &str) -> String {
    format!(r#"{{"event":"{event}","data":{{"executionId":"exec_1"}},"timestamp":"2025-01-01T00:00:00Z"}}"#)
}

/// Let spawned tasks run without advancing the paused clock meaningfully
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_success() {
    let (client, transport) = client(5);
    let _server = transport.accept();

    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(transport.open_count(), 1);

    // Already connected: no second open
    client.connect().await.unwrap();
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_state_listener_gets_current_state_immediately() {
    let (client, _transport) = client(5);
    let states = record_states(&client);
    assert_eq!(*states.lock().unwrap(), vec![ConnectionState::Disconnected]);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_then_connected() {
    let (client, transport) = client(5);
    transport.push(Script::Refuse);
    transport.push(Script::Refuse);
    transport.push(Script::Refuse);
    let server = transport.accept();
    let states = record_states(&client);

    assert!(client.connect().await.is_err());
    assert_eq!(client.state(), ConnectionState::Error);

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(transport.open_count(), 4);
    assert_eq!(transport.open_gaps_ms(), vec![1000, 2000, 4000]);
    assert_eq!(client.reconnect_attempts(), 0);

    use ConnectionState as S;
    assert_eq!(
        *states.lock().unwrap(),
        vec![
            S::Disconnected,
            S::Connecting,
            S::Error,
            S::Connecting,
            S::Error,
            S::Connecting,
            S::Error,
            S::Connecting,
            S::Connected
        ]
    );
    drop(server);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts_until_reset() {
    let (client, transport) = client(3);

    assert!(client.connect().await.is_err());
    tokio::time::sleep(Duration::from_secs(60)).await;

    // initial attempt + 3 reconnects
    assert_eq!(transport.open_count(), 4);
    assert_eq!(transport.open_gaps_ms(), vec![1000, 2000, 4000]);
    assert_eq!(client.state(), ConnectionState::Error);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(transport.open_count(), 4);
    assert_eq!(client.state(), ConnectionState::Error);

    client.reset_reconnect_attempts();
    let _server = transport.accept();
    client.connect().await.unwrap();
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_attempt() {
    let (client, transport) = client(5);
    let (_tx, rx) = mpsc::unbounded_channel();
    transport.push(Script::AcceptAfter(Duration::from_millis(200), rx));

    let (a, b) = tokio::join!(client.connect(), client.connect());
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let transport = Arc::new(ScriptedTransport::default());
    let (_tx, rx) = mpsc::unbounded_channel();
    transport.push(Script::AcceptAfter(Duration::from_secs(30), rx));
    let config = StreamClientConfig::new("ws://test/ws")
        .with_connect_timeout(Duration::from_secs(10))
        .with_max_attempts(0);
    let client = StreamClient::with_transport(config, transport);

    assert_eq!(client.connect().await, Err(Error::Timeout(10_000)));
    assert_eq!(client.state(), ConnectionState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_events_fan_out_in_order_and_bad_frames_are_dropped() {
    let (client, transport) = client(5);
    let server = transport.accept();
    client.connect().await.unwrap();

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let (f, s) = (first.clone(), second.clone());
    let _h1 = client.subscribe(move |e| f.lock().unwrap().push(e.event.clone()));
    let _h2 = client.subscribe(move |e| s.lock().unwrap().push(e.event.clone()));

    server.send(Frame::Text(event_json("step:start"))).unwrap();
    server.send(Frame::Text("not json".to_string())).unwrap();
    server.send(Frame::Text(event_json("step:complete"))).unwrap();
    settle().await;

    assert_eq!(*first.lock().unwrap(), vec!["step:start", "step:complete"]);
    assert_eq!(*second.lock().unwrap(), vec!["step:start", "step:complete"]);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_first_subscriber_auto_connects() {
    let (client, transport) = client(5);
    let _server = transport.accept();

    let h1 = client.subscribe(|_| {});
    settle().await;
    assert!(client.is_connected());

    let _h2 = client.subscribe(|_| {});
    settle().await;
    assert_eq!(transport.open_count(), 1);

    // Unsubscribing never closes the connection
    assert!(h1.unsubscribe());
    settle().await;
    assert!(client.is_connected());
    assert_eq!(client.listener_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects() {
    let (client, transport) = client(5);
    let server = transport.accept();
    let _next = transport.accept();
    client.connect().await.unwrap();

    server.send(Frame::Close(Some(1006))).unwrap();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Error);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(client.is_connected());
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_counts_as_abnormal() {
    let (client, transport) = client(5);
    let server = transport.accept();
    let _next = transport.accept();
    client.connect().await.unwrap();

    drop(server);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(client.is_connected());
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_does_not_reconnect() {
    let (client, transport) = client(5);
    let server = transport.accept();
    client.connect().await.unwrap();

    server.send(Frame::Close(Some(1000))).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_with_1000_and_cancels_reconnect() {
    let (client, transport) = client(5);
    let _server = transport.accept();
    client.connect().await.unwrap();

    client.disconnect();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(*transport.closes.lock().unwrap(), vec![1000]);

    // Pending reconnect is cancelled too
    assert!(client.connect().await.is_err());
    client.disconnect();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_does_not_break_delivery() {
    let (client, transport) = client(5);
    let server = transport.accept();
    client.connect().await.unwrap();

    let seen = Arc::new(Mutex::new(0));
    let counter = seen.clone();
    let _bad = client.subscribe(|_| panic!("listener bug"));
    let _good = client.subscribe(move |_| *counter.lock().unwrap() += 1);

    server.send(Frame::Text(event_json("step:start"))).unwrap();
    server.send(Frame::Text(event_json("step:complete"))).unwrap();
    settle().await;

    assert_eq!(*seen.lock().unwrap(), 2);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_listeners_may_subscribe_and_unsubscribe_during_delivery() {
    let (client, transport) = client(5);
    let server = transport.accept();
    client.connect().await.unwrap();

    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let removable: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));

    // On the first event, `a` removes `b` and registers `c`
    let (sink, slot, nested) = (log.clone(), removable.clone(), client.clone());
    let _a = client.subscribe(move |e| {
        sink.lock().unwrap().push(format!("a:{}", e.event));
        let handle = slot.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.unsubscribe();
            let late = sink.clone();
            nested.subscribe(move |e| late.lock().unwrap().push(format!("c:{}", e.event)));
        }
    });
    let sink = log.clone();
    let b = client.subscribe(move |e| sink.lock().unwrap().push(format!("b:{}", e.event)));
    *removable.lock().unwrap() = Some(b);

    server.send(Frame::Text(event_json("step:start"))).unwrap();
    server.send(Frame::Text(event_json("step:complete"))).unwrap();
    settle().await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["a:step:start", "b:step:start", "a:step:complete", "c:step:complete"]
    );
    assert_eq!(client.listener_count(), 2);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_state_listeners_may_change_during_notification() {
    let (client, transport) = client(5);
    let _server = transport.accept();
    let all = record_states(&client);

    // Removes itself once connecting is announced
    let once = Arc::new(Mutex::new(Vec::new()));
    let own: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));
    let (sink, slot) = (once.clone(), own.clone());
    let handle = client.subscribe_state(move |s| {
        sink.lock().unwrap().push(s);
        if s == ConnectionState::Connecting {
            let handle = slot.lock().unwrap().take();
            if let Some(handle) = handle {
                handle.unsubscribe();
            }
        }
    });
    *own.lock().unwrap() = Some(handle);

    // Registers a new state listener while connecting is announced
    let late = Arc::new(Mutex::new(Vec::new()));
    let (sink, nested) = (late.clone(), client.clone());
    let _adder = client.subscribe_state(move |s| {
        if s == ConnectionState::Connecting {
            let sink = sink.clone();
            nested.subscribe_state(move |s| sink.lock().unwrap().push(s));
        }
    });

    client.connect().await.unwrap();

    use ConnectionState as S;
    assert_eq!(*all.lock().unwrap(), vec![S::Disconnected, S::Connecting, S::Connected]);
    assert_eq!(*once.lock().unwrap(), vec![S::Disconnected, S::Connecting]);
    // Sees the current state on registration, then the next transition
    assert_eq!(*late.lock().unwrap(), vec![S::Connecting, S::Connected]);
}
