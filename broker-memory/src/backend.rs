//! Provider-side indexing/search for the memory subsystem (spec §4.9).
//!
//! Shaped after [`broker_vectorstore::VectorStoreBackend`] — spec §4.9
//! says memory is "also implemented as a provider-side vector index" —
//! but kept as its own trait rather than reused directly: memory indexes
//! free text with no session-scoped file identity, and search returns
//! ranked hits rather than an upload confirmation.

use crate::error::MemoryError;
use async_trait::async_trait;

/// One similarity-search hit.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    /// Provider-assigned handle of the matched entry.
    pub embedding_handle: String,
    /// The stored summary text.
    pub summary_text: String,
    /// Provider-reported similarity score, if any (higher is closer).
    pub score: Option<f64>,
}

/// Index and search surface delegated to a provider (spec's Non-goal: "No
/// in-process content indexing or embedding; vector search is delegated
/// to provider APIs").
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Index `text` and return the provider-assigned embedding handle.
    async fn index(&self, text: &str) -> Result<String, MemoryError>;

    /// Run a similarity search, delegated entirely to the provider.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<MemoryHit>, MemoryError>;
}
