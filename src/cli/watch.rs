//! `stepsos watch`

use anyhow::{Context, Result};
use stepsos_client::{StreamClient, StreamClientConfig, StreamEvent};
use stepsos_core::wait_for_shutdown_signal;
use tracing::info;

/// One feed event as a terminal line
pub fn format_event(event: &StreamEvent) -> String {
    let timestamp = event.timestamp.as_deref().unwrap_or("-");
    let execution = event.execution_id().unwrap_or("-");
    let step = event
        .data
        .get("stepId")
        .and_then(|s| s.as_str())
        .map(|s| format!(" step={s}"))
        .unwrap_or_default();
    let error = event
        .data
        .get("error")
        .or_else(|| event.data.get("reason"))
        .and_then(|s| s.as_str())
        .map(|s| format!(" error=\"{s}\""))
        .unwrap_or_default();
    format!("{timestamp} {:<20} execution={execution}{step}{error}", event.event)
}

/// Print events until Ctrl+C
pub async fn run(url: &str) -> Result<()> {
    let client = StreamClient::new(StreamClientConfig::new(url));

    let _state = client.subscribe_state(|state| info!(%state, "Event feed"));
    let _events = client.subscribe(|event| println!("{}", format_event(event)));

    client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    wait_for_shutdown_signal().await;
    client.disconnect();
    Ok(())
}
