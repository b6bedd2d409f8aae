//! Errors from the JSON-RPC framer and dispatcher (spec §4.1, §4.2, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors raised while reading, parsing, or dispatching JSON-RPC messages.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum McpError {
    /// A line of input was not valid JSON, or not a valid JSON-RPC
    /// envelope.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// `method` named something the dispatcher does not recognize.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// `params` was missing a field the method requires, or a field had
    /// the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Writing a response to the peer failed (broken pipe, peer gone).
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
}

impl Classify for McpError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedMessage(_) => ErrorKind::Parsing,
            Self::UnknownMethod(_) | Self::InvalidParams(_) => ErrorKind::InvalidRequest,
            Self::WriteFailed(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_classifies_as_parsing() {
        assert_eq!(
            McpError::MalformedMessage("x".into()).kind(),
            ErrorKind::Parsing
        );
    }

    #[test]
    fn unknown_method_classifies_as_invalid_request() {
        assert_eq!(
            McpError::UnknownMethod("foo".into()).kind(),
            ErrorKind::InvalidRequest
        );
    }
}
