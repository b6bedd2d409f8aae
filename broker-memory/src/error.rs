//! Memory subsystem errors (spec §4.9, §7).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from indexing or searching the memory store.
///
/// Per spec §4.9 ("Failures here are swallowed") these never reach a
/// caller directly — [`crate::store::safe_store_conversation_memory`]
/// logs and discards them — but retrieval tools (`search_project_memory`)
/// do surface them, so the type still classifies.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The backend failed to index a summary.
    #[error("failed to index memory entry: {0}")]
    IndexFailed(String),

    /// The backend failed to run a similarity search.
    #[error("memory search failed: {0}")]
    SearchFailed(String),

    /// Repository (persistence) failure.
    #[error("memory repository error: {0}")]
    Repository(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Classify for MemoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::IndexFailed(_) => ErrorKind::TransientNetwork,
            Self::SearchFailed(_) => ErrorKind::TransientNetwork,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }
}
