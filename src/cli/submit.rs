//! `stepsos submit`

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::debug;

/// Parse an inline JSON payload or read it from `@path`
pub fn read_payload(payload: &str) -> Result<Value> {
    let text = match payload.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {path}"))?,
        None => payload.to_string(),
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}

/// Post the payload to `{server}/execute` and print the response
pub async fn run(server: &str, payload: &str) -> Result<()> {
    let body = read_payload(payload)?;
    let url = format!("{}/execute", server.trim_end_matches('/'));
    debug!(%url, "Submitting payload");

    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    let reply: Value = response
        .json()
        .await
        .context("Server returned a non-JSON response")?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    if !status.is_success() {
        bail!("submission refused with HTTP {status}");
    }
    Ok(())
}
