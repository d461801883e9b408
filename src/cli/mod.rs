//! CLI module for StepsOS
//!
//! Provides commands:
//! - `serve`: Run the HTTP and event feed server
//! - `watch`: Tail the event feed of a running server
//! - `submit`: Post a payload to a running server

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::server::config::AppConfig;

pub mod submit;
pub mod watch;

/// StepsOS CLI
#[derive(Parser, Debug)]
#[command(name = "stepsos")]
#[command(about = "Step pipeline execution server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Print lifecycle events from a running server
    Watch {
        /// Event feed URL
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,
    },
    /// Submit a payload (inline JSON or @path/to/file.json)
    Submit {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
        /// JSON payload, or @file to read it from disk
        payload: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: Result<AppConfig>) -> Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run(config?).await,
        Some(Commands::Watch { url }) => watch::run(&url).await,
        Some(Commands::Submit { server, payload }) => submit::run(&server, &payload).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
