//! `entry`: canonicalize a submission. Never fails.
//!
//! Accepts the flat upload shape or the request shape
//! `{requestId, type, user: {id, role}, payload: {...}}`. Values are copied
//! as-is so that `validate` can report type errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const NAME: &str = "entry";

/// Canonical upload shape produced by `entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUpload {
    /// File identifier
    pub file_id: Value,
    /// Original file name
    pub file_name: Value,
    /// Size in megabytes
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: Value,
    /// MIME type
    pub file_type: Value,
    /// Uploader identifier
    pub uploaded_by: Value,
    /// Content checksum
    pub checksum: Value,
    /// Request correlation id
    pub request_id: String,
    /// Role of the submitting user
    pub user_role: String,
    /// When normalization happened
    pub normalized_at: DateTime<Utc>,
}

/// The entry step
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryStep;

impl EntryStep {
    /// Normalize `input`. Non-object input yields an all-defaults upload.
    #[must_use]
    pub fn run(&self, input: &Value) -> NormalizedUpload {
        let payload = input.get("payload");
        let user = input.get("user");

        let file_name = field(payload, input, "fileName").unwrap_or(Value::Null);
        let file_id = field(payload, input, "fileId")
            .or_else(|| (!file_name.is_null()).then(|| file_name.clone()))
            .unwrap_or_else(|| Value::String(String::new()));

        let uploaded_by = present(input.get("uploadedBy"))
            .or_else(|| present(user.and_then(|u| u.get("id"))))
            .unwrap_or_else(|| Value::String(String::new()));

        let now = Utc::now();
        NormalizedUpload {
            file_id,
            file_name,
            file_size_mb: field(payload, input, "fileSizeMB").unwrap_or_else(|| Value::from(0)),
            file_type: field(payload, input, "fileType")
                .unwrap_or_else(|| Value::String("application/octet-stream".to_string())),
            uploaded_by,
            checksum: field(payload, input, "checksum").unwrap_or(Value::Null),
            request_id: input
                .get("requestId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("req_{}", now.timestamp_millis())),
            user_role: user
                .and_then(|u| u.get("role"))
                .and_then(Value::as_str)
                .unwrap_or("user")
                .to_string(),
            normalized_at: now,
        }
    }
}

/// `payload.<key>`, falling back to the top-level `<key>`
fn field(payload: Option<&Value>, input: &Value, key: &str) -> Option<Value> {
    present(payload.and_then(|p| p.get(key))).or_else(|| present(input.get(key)))
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_shape_is_copied() {
        let out = EntryStep.run(&json!({
            "fileId": "f1",
            "fileName": "a.png",
            "fileSizeMB": 2.5,
            "fileType": "image/png",
            "uploadedBy": "u1",
            "checksum": "abc",
            "requestId": "req_1"
        }));
        assert_eq!(out.file_id, "f1");
        assert_eq!(out.file_name, "a.png");
        assert_eq!(out.file_size_mb, 2.5);
        assert_eq!(out.uploaded_by, "u1");
        assert_eq!(out.request_id, "req_1");
        assert_eq!(out.user_role, "user");
    }

    #[test]
    fn test_request_shape_prefers_payload() {
        let out = EntryStep.run(&json!({
            "type": "file_upload",
            "fileType": "text/plain",
            "user": {"id": "u9", "role": "admin"},
            "payload": {"fileName": "report.csv", "fileSizeMB": 1, "fileType": "text/csv"}
        }));
        assert_eq!(out.file_name, "report.csv");
        // fileId falls back to the file name
        assert_eq!(out.file_id, "report.csv");
        assert_eq!(out.file_type, "text/csv");
        assert_eq!(out.uploaded_by, "u9");
        assert_eq!(out.user_role, "admin");
    }

    #[test]
    fn test_defaults() {
        let out = EntryStep.run(&json!({}));
        assert_eq!(out.file_id, "");
        assert!(out.file_name.is_null());
        assert_eq!(out.file_size_mb, 0);
        assert_eq!(out.file_type, "application/octet-stream");
        assert_eq!(out.uploaded_by, "");
        assert!(out.checksum.is_null());
        assert!(out.request_id.starts_with("req_"));
    }

    #[test]
    fn test_no_type_coercion() {
        let out = EntryStep.run(&json!({"checksum": 123, "fileSizeMB": "big"}));
        assert_eq!(out.checksum, 123);
        assert_eq!(out.file_size_mb, "big");
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(EntryStep.run(&json!({"fileSizeMB": 3}))).unwrap();
        assert_eq!(json["fileSizeMB"], 3);
        assert!(json.get("normalizedAt").is_some());
        assert!(json.get("userRole").is_some());
    }
}
