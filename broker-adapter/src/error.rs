//! Adapter error taxonomy (spec §4.7, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors raised by an [`crate::adapter::Adapter`] call.
///
/// Mirrors the teacher's `ProviderError` shape (`agent-provider-anthropic`,
/// `agent-provider-ollama`: an HTTP-status-derived kind plus
/// `is_retryable`), generalized to the abstract [`ErrorKind`] taxonomy so
/// the retry loop and the dispatcher both classify through one predicate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network-level failure (connection reset, DNS, etc).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Provider returned 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call exceeded its deadline.
    #[error("upstream timeout")]
    Timeout,

    /// Provider returned a 4xx other than 429 — never retried.
    #[error("fatal client error ({status}): {message}")]
    FatalClient {
        /// HTTP status code, if the transport is HTTP-based.
        status: u16,
        /// Provider-supplied error message.
        message: String,
    },

    /// A `structured_output_schema` was supplied but this adapter cannot
    /// honor it (spec §4.7: "raise `unsupported` up front").
    #[error("structured output unsupported by this adapter")]
    UnsupportedStructuredOutput,

    /// The model emitted output that failed schema validation after the
    /// adapter asked it to produce JSON (spec §4.7 option (a)).
    #[error("structured output failed schema validation: {0}")]
    SchemaValidation(String),

    /// `cancel_signal` fired before the call completed.
    #[error("cancelled")]
    Cancelled,

    /// Anything else — a bug or an unmapped provider response shape.
    #[error("internal adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Map an HTTP status code to the matching [`AdapterError`] variant,
    /// following the teacher's `agent-provider-ollama::error` status-to-
    /// error mapping (429 -> rate limited, 5xx -> transient, other 4xx ->
    /// fatal).
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            500..=599 => Self::TransientNetwork(message),
            400..=499 => Self::FatalClient { status, message },
            _ => Self::Internal(message),
        }
    }
}

impl Classify for AdapterError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork(_) => ErrorKind::TransientNetwork,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Timeout => ErrorKind::UpstreamTimeout,
            Self::FatalClient { .. } => ErrorKind::FatalClientInput,
            Self::UnsupportedStructuredOutput | Self::SchemaValidation(_) => ErrorKind::InvalidRequest,
            Self::Cancelled => ErrorKind::Internal,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
