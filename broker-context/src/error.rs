//! Errors from context assembly.

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from the gather/classify/score/split pipeline (spec §4.4, §7).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextError {
    /// A declared input path escaped the allowed roots or otherwise failed
    /// validation before any filesystem walk began.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An I/O error occurred while walking or reading a file. Per spec.md
    /// §4.4's edge cases this is surfaced as a warning attached to the
    /// assembled context, not a hard failure of the call — callers that
    /// need a hard failure construct this variant explicitly.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path being read when the error occurred.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configured tokenizer failed to score a file's content.
    #[error("scoring failed: {0}")]
    Scoring(String),
}

impl Classify for ContextError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidRequest,
            Self::Io { .. } | Self::Scoring(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal problem encountered while assembling context (spec §4.4
/// edge cases: missing/unreadable files are warnings, not errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWarning {
    /// Path the warning concerns.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ContextWarning {
    /// Build a warning for a path that could not be read.
    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_path_classifies_as_invalid_request() {
        assert_eq!(
            ContextError::InvalidPath("x".into()).kind(),
            ErrorKind::InvalidRequest
        );
    }
}
