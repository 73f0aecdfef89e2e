//! Canonical task status and the vendor-string mapping onto it.

use crate::error::{GenFlowError, Result};
use serde::{Deserialize, Serialize};

/// Canonical lifecycle state of one remote generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted by the provider, not started.
    Pending,
    /// Being generated.
    Running,
    /// Finished with an artifact.
    Succeeded,
    /// Finished without an artifact.
    Failed,
}

impl TaskStatus {
    /// Maps a vendor status string onto the canonical states.
    ///
    /// Matching is case-insensitive. Unrecognised strings are a
    /// [`GenFlowError::Protocol`] error.
    pub fn from_vendor(status: &str) -> Result<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "queueing" | "submitted" | "created" => Ok(Self::Pending),
            "running" | "processing" | "in_progress" | "generating" => Ok(Self::Running),
            "succeeded" | "success" | "succeed" | "completed" | "done" => Ok(Self::Succeeded),
            // DashScope reports UNKNOWN for expired or missing tasks
            "failed" | "failure" | "fail" | "error" | "canceled" | "cancelled" | "expired"
            | "unknown" => Ok(Self::Failed),
            _ => Err(GenFlowError::Protocol(format!(
                "unrecognised task status `{status}`"
            ))),
        }
    }

    /// Returns true for SUCCEEDED and FAILED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_vendor(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_vendor_synonyms() {
        assert_eq!(TaskStatus::from_vendor("queued").unwrap(), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_vendor("In_Progress").unwrap(), TaskStatus::Running);
        assert_eq!(TaskStatus::from_vendor("succeeded").unwrap(), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::from_vendor("cancelled").unwrap(), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_vendor("UNKNOWN").unwrap(), TaskStatus::Failed);
    }

    #[test]
    fn test_unrecognised_is_protocol_error() {
        let err = TaskStatus::from_vendor("HALF_DONE").unwrap_err();
        assert!(matches!(err, GenFlowError::Protocol(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_terminal() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
    }
}
