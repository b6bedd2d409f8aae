//! Persistence seam for [`VectorStoreEntry`] records.
//!
//! Grounded on the teacher's `layer0::state::StateStore` trait shape
//! (async get/upsert over a key); `broker-db` provides the SQLite-backed
//! implementation used in production, matching spec §4.6's "backed by a
//! local database with write-ahead logging" requirement applied here to
//! vector-store leases instead of sessions.

use crate::error::VectorStoreError;
use async_trait::async_trait;
use broker_types::{SessionId, VectorStoreEntry};

/// Storage for vector-store lease records, keyed by session.
#[async_trait]
pub trait VectorStoreRepository: Send + Sync {
    /// Fetch the entry for a session, if one exists.
    async fn get(&self, session_id: &SessionId) -> Result<Option<VectorStoreEntry>, VectorStoreError>;

    /// Atomically replace the entry for a session.
    async fn upsert(&self, entry: &VectorStoreEntry) -> Result<(), VectorStoreError>;

    /// Delete the entry for a session.
    async fn delete(&self, session_id: &SessionId) -> Result<(), VectorStoreError>;

    /// All entries, for the periodic expiry sweep and capacity-based
    /// eviction (spec §4.5: "evict the least-recently-renewed entry
    /// first").
    async fn list_all(&self) -> Result<Vec<VectorStoreEntry>, VectorStoreError>;
}
