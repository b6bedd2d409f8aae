//! Errors from tool lookup, routing, and execution.

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from tool operations (spec §4.3, §7).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// An argument was present but not declared in the registry for this
    /// tool, or a declared required argument was missing.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// JSON Schema validation of a structured-output request or response
    /// failed.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The call was cancelled before or during execution.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for errors without a more specific variant.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Classify for ToolError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::InvalidRequest(_) | Self::SchemaValidation(_) => {
                ErrorKind::InvalidRequest
            }
            Self::ExecutionFailed(_) | Self::Other(_) => ErrorKind::ToolExecution,
            Self::Cancelled => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classifies_as_invalid_request() {
        assert_eq!(
            ToolError::NotFound("x".into()).kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn execution_failed_classifies_as_tool_execution() {
        assert_eq!(
            ToolError::ExecutionFailed("boom".into()).kind(),
            ErrorKind::ToolExecution
        );
    }
}
