//! `process`: turn a validated upload into an artifact description.

use super::validate::display;
use crate::error::StepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub(crate) const NAME: &str = "process";

const REQUIREMENT: &str = "validated input (validation.status == \"passed\")";

/// Details of the processing outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// Always `"success"`
    pub status: String,
    /// Size in megabytes
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: Value,
    /// MIME type of the file
    pub mime_type: Value,
    /// Uploader identifier
    pub uploaded_by: Value,
}

/// Output of `process`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedArtifact {
    /// `artifact_<uuid>`
    pub artifact_id: String,
    /// File identifier
    pub file_id: Value,
    /// Where the processed file is served
    pub file_url: String,
    /// Processing time
    pub processed_at: DateTime<Utc>,
    /// One-line description
    pub summary: String,
    /// Outcome details
    pub processing_result: ProcessingResult,
}

/// The process step
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStep;

impl ProcessStep {
    /// Process a validated upload.
    ///
    /// Fails with [`StepError::ContractViolation`] when the validation marker
    /// is missing or not `"passed"`.
    pub fn run(&self, input: &Value) -> Result<ProcessedArtifact, StepError> {
        let passed = input
            .get("validation")
            .and_then(|v| v.get("status"))
            .and_then(Value::as_str)
            == Some("passed");
        if !passed {
            return Err(StepError::ContractViolation {
                step: NAME.to_string(),
                requirement: REQUIREMENT.to_string(),
            });
        }

        let get = |key: &str| input.get(key).cloned().unwrap_or(Value::Null);
        let file_id = get("fileId");
        let file_size_mb = get("fileSizeMB");
        let file_type = get("fileType");
        let uploaded_by = get("uploadedBy");

        let summary = format!(
            "Processed {} ({} MB, {}) uploaded by {}",
            display(&get("fileName")),
            display(&file_size_mb),
            display(&file_type),
            display(&uploaded_by),
        );

        Ok(ProcessedArtifact {
            artifact_id: format!("artifact_{}", Uuid::new_v4().simple()),
            file_url: format!("/api/files/{}", display(&file_id)),
            file_id,
            processed_at: Utc::now(),
            summary,
            processing_result: ProcessingResult {
                status: "success".to_string(),
                file_size_mb,
                mime_type: file_type,
                uploaded_by,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requires_validation_marker() {
        let err = ProcessStep.run(&json!({"fileId": "f1"})).unwrap_err();
        assert_eq!(err.kind(), "contract_violation");
        assert_eq!(
            err.to_string(),
            "process requires validated input (validation.status == \"passed\")"
        );

        let failed_marker = json!({"validation": {"status": "failed"}});
        assert!(ProcessStep.run(&failed_marker).is_err());
    }

    #[test]
    fn test_artifact_shape() {
        let out = ProcessStep
            .run(&json!({
                "fileId": "f1",
                "fileName": "a.png",
                "fileSizeMB": 2.5,
                "fileType": "image/png",
                "uploadedBy": "u1",
                "validation": {"status": "passed"}
            }))
            .unwrap();

        assert!(out.artifact_id.starts_with("artifact_"));
        assert_eq!(out.file_url, "/api/files/f1");
        assert_eq!(out.summary, "Processed a.png (2.5 MB, image/png) uploaded by u1");
        assert_eq!(out.processing_result.status, "success");

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["processingResult"]["fileSizeMB"], 2.5);
        assert_eq!(json["processingResult"]["mimeType"], "image/png");
    }

    #[test]
    fn test_artifact_ids_are_unique() {
        let input = json!({"validation": {"status": "passed"}});
        let a = ProcessStep.run(&input).unwrap();
        let b = ProcessStep.run(&input).unwrap();
        assert_ne!(a.artifact_id, b.artifact_id);
    }
}
