//! Errors from vector-store lease management (spec §4.5, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from [`crate::manager::VectorStoreManager`] operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// No entry exists for the given session and none could be created.
    #[error("no vector store for session {0}")]
    NotFound(String),

    /// A file upload to the provider failed partway through `acquire`.
    /// The upload may be partially applied; already-confirmed hashes in
    /// `uploaded_so_far` are retained in the record (spec §4.5: "Failure
    /// of an upload is surfaced with the upload partially applied").
    #[error("upload failed after {uploaded_so_far} of {requested} files: {message}")]
    UploadFailed {
        /// Human-readable upload failure.
        message: String,
        /// Files confirmed uploaded before the failure.
        uploaded_so_far: usize,
        /// Total files requested in this acquire call.
        requested: usize,
    },

    /// The provider is at or above its configured capacity threshold and
    /// no entry could be evicted to make room.
    #[error("vector store capacity exceeded")]
    CapacityExceeded,

    /// Repository (persistence) failure.
    #[error("repository error: {0}")]
    Repository(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Classify for VectorStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::InvalidRequest,
            Self::UploadFailed { .. } => ErrorKind::TransientNetwork,
            Self::CapacityExceeded => ErrorKind::ToolExecution,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_failed_is_retryable() {
        let err = VectorStoreError::UploadFailed {
            message: "timeout".into(),
            uploaded_so_far: 2,
            requested: 5,
        };
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn capacity_exceeded_is_not_retryable() {
        assert!(!VectorStoreError::CapacityExceeded.kind().is_retryable());
    }
}
