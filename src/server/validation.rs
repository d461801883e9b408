//! Startup configuration validation

use super::config::AppConfig;
use super::loader::environment_name;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject configurations the server cannot run with and warn about risky ones
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        bail!("server.port must be non-zero");
    }

    if config.pipeline.allowed_file_types.is_empty() {
        bail!("pipeline.allowed_file_types must list at least one MIME type");
    }

    if config.pipeline.default_workflow_id.trim().is_empty() {
        bail!("pipeline.default_workflow_id must be non-empty");
    }

    if config.server.host == "0.0.0.0" && environment_name().eq_ignore_ascii_case("production") {
        warn!(
            "SECURITY WARNING: Server is binding to all interfaces (0.0.0.0) in production. \
             Consider binding to 127.0.0.1 and using a reverse proxy."
        );
    }

    if config.narration.provider == "groq" && std::env::var("GROQ_API_KEY").is_err() {
        warn!("GROQ_API_KEY is not set, narration will use the local narrator");
    }

    Ok(())
}
