//! Persistence seam for [`broker_types::MemoryEntry`] records.
//!
//! Grounded on the same `layer0::state::StateStore`-shaped async
//! get/insert convention as [`broker_vectorstore::VectorStoreRepository`];
//! `broker-db` supplies the SQLite-backed implementation.

use crate::error::MemoryError;
use async_trait::async_trait;
use broker_types::{MemoryEntry, SessionId};

/// Storage for write-once memory entries.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Persist a new entry. Entries are never updated after insertion
    /// (spec §3: "Write-once").
    async fn insert(&self, entry: &MemoryEntry) -> Result<(), MemoryError>;

    /// All entries recorded for a session, newest first.
    async fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// All entries across every session, used by `search_project_memory`
    /// to resolve embedding handles back to summary text when a backend
    /// only returns handles.
    async fn list_all(&self) -> Result<Vec<MemoryEntry>, MemoryError>;
}
