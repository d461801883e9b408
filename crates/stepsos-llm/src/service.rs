//! Narration with guaranteed local fallback.

use crate::error::Error;
use crate::groq::{GroqConfig, GroqNarrator};
use crate::local::LocalNarrator;
use crate::narrator::{ExecutionNarration, Narrator, StepNarration};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How to build the service
#[derive(Debug, Clone)]
pub struct NarrationSettings {
    /// `"groq"` or `"local"`
    pub provider: String,
    /// Remote model override
    pub model: Option<String>,
    /// Remote request timeout
    pub timeout: Duration,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Front door for narration. Never fails: any remote error is logged and
/// answered by [`LocalNarrator`].
#[derive(Clone)]
pub struct NarrationService {
    remote: Option<Arc<dyn Narrator>>,
}

impl std::fmt::Debug for NarrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationService")
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl NarrationService {
    /// Local narration only
    #[must_use]
    pub fn local_only() -> Self {
        Self { remote: None }
    }

    /// Use `remote` first, falling back to local narration
    #[must_use]
    pub fn with_remote(remote: Arc<dyn Narrator>) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    /// Build from settings. A missing API key or unknown provider yields a
    /// local-only service.
    #[must_use]
    pub fn from_settings(settings: &NarrationSettings) -> Self {
        match settings.provider.as_str() {
            "groq" => {
                let config = match GroqConfig::from_env() {
                    Ok(config) => config.with_timeout(settings.timeout),
                    Err(e) => {
                        info!(error = %e, "Remote narration unavailable, using local narrator");
                        return Self::local_only();
                    }
                };
                let config = match &settings.model {
                    Some(model) => config.with_model(model.clone()),
                    None => config,
                };
                match GroqNarrator::new(config) {
                    Ok(narrator) => {
                        info!(provider = "groq", model = narrator.model(), "Remote narration enabled");
                        Self::with_remote(Arc::new(narrator))
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to build Groq narrator, using local narrator");
                        Self::local_only()
                    }
                }
            }
            "local" => Self::local_only(),
            other => {
                warn!(provider = other, "Unknown narration provider, using local narrator");
                Self::local_only()
            }
        }
    }

    /// Name of the narrator tried first
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.remote.as_ref().map_or("local", |r| r.name())
    }

    /// Step analysis
    pub async fn analyze_step(&self, step: &StepNarration) -> String {
        if let Some(remote) = &self.remote {
            match remote.analyze_step(step).await {
                Ok(text) => return text,
                Err(e) => fallback_warning(remote.name(), "analyze_step", &e),
            }
        }
        LocalNarrator::describe_step(step)
    }

    /// Recovery suggestion
    pub async fn recovery_suggestion(&self, step: &StepNarration) -> String {
        if let Some(remote) = &self.remote {
            match remote.recovery_suggestion(step).await {
                Ok(text) => return text,
                Err(e) => fallback_warning(remote.name(), "recovery_suggestion", &e),
            }
        }
        LocalNarrator::recovery_for(step)
    }

    /// Improvement suggestions
    pub async fn improvements(&self, step: &StepNarration) -> Vec<String> {
        if let Some(remote) = &self.remote {
            match remote.improvements(step).await {
                Ok(list) if !list.is_empty() => return list,
                Ok(_) => {}
                Err(e) => fallback_warning(remote.name(), "improvements", &e),
            }
        }
        LocalNarrator::improvements_for(step)
    }

    /// Execution explanation
    pub async fn explain_execution(&self, execution: &ExecutionNarration) -> String {
        if let Some(remote) = &self.remote {
            match remote.explain_execution(execution).await {
                Ok(text) => return text,
                Err(e) => fallback_warning(remote.name(), "explain_execution", &e),
            }
        }
        LocalNarrator::explain(execution)
    }
}

fn fallback_warning(provider: &str, operation: &str, error: &Error) {
    warn!(provider, operation, error = %error, "Remote narration failed, using local narrator");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::MockNarrator;
    use serde_json::json;

    fn step() -> StepNarration {
        StepNarration {
            execution_id: Some("exec_1".to_string()),
            step_id: "validate".to_string(),
            step_data: json!({"status": "failed", "error": "fileName is required"}),
        }
    }

    #[tokio::test]
    async fn test_remote_answer_is_used() {
        let mut mock = MockNarrator::new();
        mock.expect_name().return_const("mock");
        mock.expect_analyze_step()
            .times(1)
            .returning(|_| Ok("remote analysis".to_string()));

        let service = NarrationService::with_remote(Arc::new(mock));
        assert_eq!(service.analyze_step(&step()).await, "remote analysis");
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let mut mock = MockNarrator::new();
        mock.expect_name().return_const("mock");
        mock.expect_recovery_suggestion()
            .returning(|_| Err(Error::Api("boom".to_string())));
        mock.expect_improvements()
            .returning(|_| Err(Error::Timeout(30_000)));

        let service = NarrationService::with_remote(Arc::new(mock));
        let step = step();
        assert_eq!(
            service.recovery_suggestion(&step).await,
            LocalNarrator::recovery_for(&step)
        );
        assert_eq!(
            service.improvements(&step).await,
            LocalNarrator::improvements_for(&step)
        );
    }

    #[tokio::test]
    async fn test_empty_remote_improvements_fall_back() {
        let mut mock = MockNarrator::new();
        mock.expect_name().return_const("mock");
        mock.expect_improvements().returning(|_| Ok(Vec::new()));

        let service = NarrationService::with_remote(Arc::new(mock));
        assert!(!service.improvements(&step()).await.is_empty());
    }

    #[tokio::test]
    async fn test_local_only() {
        let service = NarrationService::local_only();
        assert_eq!(service.provider_name(), "local");
        let execution = ExecutionNarration {
            execution_id: "exec_1".to_string(),
            record: json!({"status": "completed", "steps": []}),
            question: None,
        };
        assert_eq!(
            service.explain_execution(&execution).await,
            "Execution exec_1 is completed. No step has run yet."
        );
    }

    #[test]
    fn test_local_provider_setting() {
        let settings = NarrationSettings {
            provider: "local".to_string(),
            ..Default::default()
        };
        assert_eq!(NarrationService::from_settings(&settings).provider_name(), "local");
    }
}
