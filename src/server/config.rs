//! Server configuration types
//!
//! Every section has serde defaults so a partial override file only needs
//! the keys it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use stepsos_core::{RunnerConfig, DEFAULT_WORKFLOW_ID};
use stepsos_llm::NarrationSettings;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Simulated delay after each completed step, in milliseconds
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// MIME types accepted by the validate step
    #[serde(default = "default_allowed_file_types")]
    pub allowed_file_types: Vec<String>,
    /// Workflow id for submissions that name none
    #[serde(default = "default_workflow_id")]
    pub default_workflow_id: String,
}

fn default_step_delay_ms() -> u64 {
    1000
}

fn default_allowed_file_types() -> Vec<String> {
    stepsos_core::steps::DEFAULT_ALLOWED_FILE_TYPES
        .iter()
        .map(|t| (*t).to_string())
        .collect()
}

fn default_workflow_id() -> String {
    DEFAULT_WORKFLOW_ID.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            allowed_file_types: default_allowed_file_types(),
            default_workflow_id: default_workflow_id(),
        }
    }
}

impl PipelineConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            step_delay: Duration::from_millis(self.step_delay_ms),
        }
    }
}

/// Narration provider. The API key is read from `GROQ_API_KEY` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NarrationConfig {
    pub fn settings(&self) -> NarrationSettings {
        NarrationSettings {
            provider: self.provider.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight executions
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_drain_timeout_secs() -> u64 {
    10
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
