//! `validate`: field rules on the canonical upload.
//!
//! Every rule runs; all violations are reported together in one
//! [`StepError::ValidationFailed`].

use crate::error::StepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) const NAME: &str = "validate";

/// Number of field rules checked
pub const RULES_CHECKED: u32 = 6;

/// File types accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_FILE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "text/plain",
    "text/csv",
    "application/json",
];

/// Evidence that validation passed, read back by `process`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMarker {
    /// Always `"passed"` when produced by this step
    pub status: String,
    /// When the rules ran
    pub checked_at: DateTime<Utc>,
    /// How many rules were evaluated
    pub rules_checked: u32,
}

/// The canonical upload with the validation marker attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedUpload {
    /// Upload fields, unchanged
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Validation marker
    pub validation: ValidationMarker,
}

/// The validate step
#[derive(Debug, Clone)]
pub struct ValidateStep {
    allowed_file_types: Vec<String>,
}

impl ValidateStep {
    /// Validate against the given MIME allow-list
    #[must_use]
    pub fn new(allowed_file_types: Vec<String>) -> Self {
        Self { allowed_file_types }
    }

    /// Configured allow-list
    #[must_use]
    pub fn allowed_file_types(&self) -> &[String] {
        &self.allowed_file_types
    }

    /// Check every rule and collect the violations
    #[must_use]
    pub fn violations(&self, input: &Value) -> Vec<String> {
        let mut errors = Vec::new();

        required_string(input, "fileId", &mut errors);
        required_string(input, "fileName", &mut errors);

        match input.get("fileSizeMB").and_then(Value::as_f64) {
            None => errors.push("fileSizeMB must be a number".to_string()),
            Some(size) if size <= 0.0 => errors.push("fileSizeMB must be > 0".to_string()),
            Some(_) => {}
        }

        let file_type = input.get("fileType").unwrap_or(&Value::Null);
        let allowed = file_type
            .as_str()
            .is_some_and(|t| self.allowed_file_types.iter().any(|a| a == t));
        if !allowed {
            errors.push(format!("Unsupported fileType: {}", display(file_type)));
        }

        required_string(input, "uploadedBy", &mut errors);

        match input.get("checksum") {
            None | Some(Value::Null) => errors.push("checksum is required".to_string()),
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.push("checksum must be non-empty string".to_string());
            }
            Some(Value::String(_)) => {}
            Some(_) => errors.push("checksum must be a string".to_string()),
        }

        errors
    }

    /// Run the rules; on success attach the validation marker
    pub fn run(&self, input: &Value) -> Result<ValidatedUpload, StepError> {
        let errors = self.violations(input);
        if !errors.is_empty() {
            return Err(StepError::ValidationFailed(errors));
        }

        let mut fields = input.as_object().cloned().unwrap_or_default();
        fields.remove("validation");
        Ok(ValidatedUpload {
            fields,
            validation: ValidationMarker {
                status: "passed".to_string(),
                checked_at: Utc::now(),
                rules_checked: RULES_CHECKED,
            },
        })
    }
}

fn required_string(input: &Value, key: &str, errors: &mut Vec<String>) {
    match input.get(key) {
        None | Some(Value::Null) => errors.push(format!("{key} is required")),
        Some(Value::String(s)) if s.is_empty() => errors.push(format!("{key} is required")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(format!("{key} must be non-empty string"));
        }
        Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{key} must be a string")),
    }
}

/// Render a JSON value for a human message: strings unquoted
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
