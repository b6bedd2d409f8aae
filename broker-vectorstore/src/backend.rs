//! Provider-side vector store operations, abstracted so the manager can be
//! tested without a real upstream (spec §4.5).

use crate::error::VectorStoreError;
use async_trait::async_trait;
use broker_types::{FileRef, VectorStoreId};

/// Upload/create/delete operations against a provider's vector store API.
///
/// Content-hash dedup happens provider-side: re-uploading a file whose
/// hash the provider already has is idempotent (spec §4.5: "idempotent at
/// the provider via content-hash dedup"), so the manager does not need to
/// special-case restart-time re-uploads beyond simply calling `upload`
/// again.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Create a new, empty vector store and return its provider-assigned
    /// id.
    async fn create_store(&self) -> Result<VectorStoreId, VectorStoreError>;

    /// Upload one file's content to an existing store.
    async fn upload(&self, vs_id: &VectorStoreId, file: &FileRef) -> Result<(), VectorStoreError>;

    /// Delete a store on the provider side.
    async fn delete_store(&self, vs_id: &VectorStoreId) -> Result<(), VectorStoreError>;

    /// Total number of stores currently allocated to this account on the
    /// provider, used for the capacity check (spec §4.5).
    async fn store_count(&self) -> Result<u64, VectorStoreError>;

    /// The provider's hard cap on concurrent stores.
    fn capacity(&self) -> u64;
}
