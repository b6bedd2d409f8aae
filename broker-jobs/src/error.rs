//! Errors from the job queue (spec §4.8, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from [`crate::queue::JobQueue`] operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum JobError {
    /// No job exists with the given id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded back into a [`broker_types::JobRecord`].
    #[error("corrupt job row: {0}")]
    Corrupt(String),
}

impl Classify for JobError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::InvalidRequest,
            Self::Database(_) | Self::Corrupt(_) => ErrorKind::Internal,
        }
    }
}
