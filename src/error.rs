use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::glb::GlbError;

/// Fatal conversion failures. Anything recoverable is reported as a
/// [`ValidationIssue`] instead.
#[derive(Error, Debug)]
pub enum VrmError {
    #[error("malformed container: {0}")]
    Container(#[from] GlbError),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Severity level used by validation issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single recoverable issue produced during export or import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Accumulates recoverable issues for one conversion and mirrors them to the
/// log as they arrive.
#[derive(Debug, Clone, Default)]
pub struct Issues {
    entries: Vec<ValidationIssue>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code, "{message}");
        self.push(Severity::Warning, code, message);
    }

    pub fn info(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(code, "{message}");
        self.push(Severity::Info, code, message);
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(code, "{message}");
        self.push(Severity::Error, code, message);
    }

    fn push(&mut self, severity: Severity, code: &str, message: String) {
        self.entries.push(ValidationIssue {
            severity,
            code: code.to_string(),
            message,
        });
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.entries.iter().any(|issue| issue.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationIssue> {
        self.entries
    }
}

// Issue codes shared across the pipeline.
pub const PRECISION_NON_FINITE: &str = "PRECISION_NON_FINITE";
pub const PRECISION_JOINT_TRUNCATED: &str = "PRECISION_JOINT_TRUNCATED";
pub const PRECISION_FALLBACK_JOINT: &str = "PRECISION_FALLBACK_JOINT";
pub const UNSUPPORTED_SHADER_MAPPING: &str = "UNSUPPORTED_SHADER_MAPPING";
pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
pub const EMPTY_PRIMITIVE: &str = "EMPTY_PRIMITIVE";
pub const INVALID_JSON_KEY: &str = "INVALID_JSON_KEY";
pub const UNSUPPORTED_JSON_VALUE: &str = "UNSUPPORTED_JSON_VALUE";
pub const MISSING_REQUIRED_BONE: &str = "MISSING_REQUIRED_BONE";
pub const MULTIPLE_ARMATURES: &str = "MULTIPLE_ARMATURES";
pub const COLLIDER_SIMPLIFIED: &str = "COLLIDER_SIMPLIFIED";
pub const INVALID_BONE_HIERARCHY: &str = "INVALID_BONE_HIERARCHY";
pub const NODE_TRANSFORM_IGNORED: &str = "NODE_TRANSFORM_IGNORED";
pub const IMAGE_UNREADABLE: &str = "IMAGE_UNREADABLE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_recorded_warning_when_querying_code_then_issue_is_found() {
        let mut issues = Issues::new();
        issues.warn(UNRESOLVED_REFERENCE, "bone 'tail' was not found");

        assert!(issues.has_code(UNRESOLVED_REFERENCE));
        assert!(!issues.has_code(EMPTY_PRIMITIVE));
        assert_eq!(issues.iter().next().map(|i| i.severity), Some(Severity::Warning));
    }

    #[test]
    fn given_container_error_when_converting_then_vrm_error_wraps_it() {
        let error = VrmError::from(GlbError::MissingJsonChunk);
        assert!(matches!(error, VrmError::Container(GlbError::MissingJsonChunk)));
        assert!(error.to_string().contains("JSON"));
    }
}
