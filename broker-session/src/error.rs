//! Errors from the session continuity cache (spec §4.6, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from [`crate::store::SessionStore`] operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row's JSON column failed to deserialize into the expected
    /// type. Indicates a schema/version mismatch, not a caller mistake.
    #[error("corrupt session record for {session_id}: {message}")]
    Corrupt {
        /// Session the bad row belongs to.
        session_id: String,
        /// Deserialization failure detail.
        message: String,
    },
}

impl Classify for SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Internal,
            Self::Corrupt { .. } => ErrorKind::Internal,
        }
    }
}
