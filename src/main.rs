//! StepsOS - step pipeline execution server
//!
//! CLI entry point for the StepsOS server and its client commands.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod server;
mod websocket;

use server::config::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Loaded before tracing so the log format can come from it. A load error
    // only matters to `serve`.
    let config = server::load_config();
    let format = config
        .as_ref()
        .map(|c| c.logging.format)
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stepsos=info,stepsos_core=info,stepsos_client=info,tower_http=info".into()
            }),
        )
        .with((format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json()))
        .with((format == LogFormat::Pretty).then(tracing_subscriber::fmt::layer))
        .init();

    let cli = cli::Cli::parse();

    if matches!(cli.command, Some(cli::Commands::Serve)) {
        info!("Starting StepsOS v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli, config).await
}
