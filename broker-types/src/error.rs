//! Shared error taxonomy (spec §7).
//!
//! Every subsystem has its own `thiserror` error enum (`ToolError`,
//! `VectorStoreError`, `SessionError`, ...), matching the teacher's
//! per-crate `error.rs` convention. [`ErrorKind`] is the abstract
//! classification spec.md §7 requires at the JSON-RPC boundary: each
//! subsystem error knows how to classify itself via [`Classify::kind`], and
//! the dispatcher uses that classification (not the concrete type) to
//! decide retry-vs-surface-vs-abort-startup.

use std::fmt;

/// Abstract error kind, independent of which subsystem raised it.
///
/// This is deliberately not a type hierarchy: a `ToolError::InvalidInput`
/// and a `ContextError::BadPath` both classify as
/// [`ErrorKind::InvalidRequest`], and the dispatcher treats them
/// identically once classified.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure talking to an upstream provider; retryable.
    TransientNetwork,
    /// Provider returned 429 / rate-limit; retryable with backoff.
    RateLimited,
    /// Provider call exceeded its deadline; retryable.
    UpstreamTimeout,
    /// Malformed or semantically invalid client input (4xx from a
    /// provider's point of view); never retried, always user-visible.
    FatalClientInput,
    /// A JSON-RPC line failed to parse.
    Parsing,
    /// A `tools/call` argument was missing, unknown, or failed schema
    /// validation.
    InvalidRequest,
    /// A configuration value was missing or malformed.
    Configuration,
    /// Startup-time initialization failed (catalog load, migrations, ...).
    Initialization,
    /// A tool's own execution logic failed.
    ToolExecution,
    /// Anything else — a bug, not a user or environment problem.
    Internal,
}

impl ErrorKind {
    /// Whether an error of this kind should be retried by the adapter's
    /// backoff loop (spec §4.7, §7).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork | Self::RateLimited | Self::UpstreamTimeout
        )
    }

    /// Whether this kind, surfaced at call time, terminates the process
    /// rather than becoming an `isError: true` result (spec §7: only
    /// configuration/initialization errors detected at *startup* abort;
    /// at call time they too become `isError`). This is `false` for every
    /// variant — kept as a named predicate so call sites read as intent,
    /// not as a magic `false`.
    pub fn aborts_process_at_call_time(&self) -> bool {
        false
    }
}

/// Anything that can classify itself into an [`ErrorKind`]. Implemented by
/// every subsystem's error enum so the dispatcher can treat them uniformly
/// at the JSON-RPC boundary without matching on concrete types.
pub trait Classify {
    /// The abstract kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// Top-level error carried across the dispatcher boundary: an
/// [`ErrorKind`] plus a human-readable message and optional cause, used
/// when building the `isError: true` tool result (spec §6, §7).
#[derive(Debug)]
pub struct BrokerError {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BrokerError {
    /// Construct from a kind and message, with no underlying cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause, kept for logging but not shown to the
    /// client by default.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The abstract kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The user-visible message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BrokerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}
