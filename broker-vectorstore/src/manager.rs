//! The vector-store lease manager (spec §4.5): acquire, renew,
//! release-on-expiry, and capacity-checked eviction.

use crate::backend::VectorStoreBackend;
use crate::error::VectorStoreError;
use crate::repository::VectorStoreRepository;
use broker_types::{EpochSeconds, FileRef, SessionId, VectorStoreEntry, VectorStoreId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Fraction of provider capacity at which the manager starts evicting the
/// least-recently-renewed entry before creating a new store (spec §4.5:
/// "e.g., 95% of the provider cap").
pub const DEFAULT_CAPACITY_THRESHOLD: f64 = 0.95;

/// Outcome of a successful [`VectorStoreManager::acquire`] call.
#[derive(Debug)]
pub struct AcquireOutcome {
    /// The session's vector store id, existing or newly created.
    pub vs_id: VectorStoreId,
    /// Content hashes that were uploaded as part of this call (the delta
    /// between what was requested and what the record already had).
    pub uploaded_deltas: HashSet<String>,
}

/// Manages per-session vector-store leases.
///
/// Per-session `acquire` calls are serialized via a per-session async
/// mutex (spec §4.5: "per-session acquire is serialized (one builder per
/// fingerprint)"); cross-session acquires proceed concurrently.
pub struct VectorStoreManager<B, R> {
    backend: Arc<B>,
    repo: Arc<R>,
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    capacity_threshold: f64,
    ttl_secs: i64,
    delete_on_evict: bool,
}

impl<B, R> VectorStoreManager<B, R>
where
    B: VectorStoreBackend,
    R: VectorStoreRepository,
{
    /// Build a manager with the default capacity threshold.
    pub fn new(backend: Arc<B>, repo: Arc<R>, ttl_secs: i64, delete_on_evict: bool) -> Self {
        Self {
            backend,
            repo,
            session_locks: Mutex::new(HashMap::new()),
            capacity_threshold: DEFAULT_CAPACITY_THRESHOLD,
            ttl_secs,
            delete_on_evict,
        }
    }

    async fn lock_for_session(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reserve the vector-store slot for `session_id` and upload whatever
    /// part of `overflow_files` is not yet present (spec §4.5 `acquire`).
    pub async fn acquire(
        &self,
        session_id: &SessionId,
        overflow_files: &[FileRef],
        now: EpochSeconds,
    ) -> Result<AcquireOutcome, VectorStoreError> {
        let session_lock = self.lock_for_session(session_id).await;
        let _guard = session_lock.lock().await;

        let mut entry = match self.repo.get(session_id).await? {
            Some(mut existing) if !existing.is_expired(now) => {
                existing.renew(now, self.ttl_secs);
                self.repo.upsert(&existing).await?;
                existing
            }
            Some(expired) => {
                self.repo.delete(session_id).await?;
                if self.delete_on_evict {
                    let _ = self.backend.delete_store(&expired.vs_id).await;
                }
                self.create_entry(session_id, now).await?
            }
            None => self.create_entry(session_id, now).await?,
        };

        let requested: HashSet<String> = overflow_files
            .iter()
            .filter_map(|f| f.content_hash.clone())
            .collect();
        let missing_hashes = entry.missing(&requested);

        let mut uploaded = HashSet::new();
        for file in overflow_files {
            let Some(hash) = file.content_hash.as_deref() else {
                continue;
            };
            if !missing_hashes.contains(hash) {
                continue;
            }
            if let Err(e) = self.backend.upload(&entry.vs_id, file).await {
                warn!(session = %session_id, error = %e, "vector store upload failed partway through acquire");
                return Err(VectorStoreError::UploadFailed {
                    message: e.to_string(),
                    uploaded_so_far: uploaded.len(),
                    requested: missing_hashes.len(),
                });
            }
            entry.file_hashes.insert(hash.to_string());
            self.repo.upsert(&entry).await?;
            uploaded.insert(hash.to_string());
        }

        Ok(AcquireOutcome {
            vs_id: entry.vs_id,
            uploaded_deltas: uploaded,
        })
    }

    async fn create_entry(
        &self,
        session_id: &SessionId,
        now: EpochSeconds,
    ) -> Result<VectorStoreEntry, VectorStoreError> {
        self.ensure_capacity().await?;
        let vs_id = self.backend.create_store().await?;
        let entry = VectorStoreEntry::new(vs_id, session_id.clone(), now, self.ttl_secs);
        self.repo.upsert(&entry).await?;
        Ok(entry)
    }

    async fn ensure_capacity(&self) -> Result<(), VectorStoreError> {
        let capacity = self.backend.capacity();
        if capacity == 0 {
            return Ok(());
        }
        let count = self.backend.store_count().await?;
        if (count as f64) < capacity as f64 * self.capacity_threshold {
            return Ok(());
        }

        let mut entries = self.repo.list_all().await?;
        entries.sort_by_key(|e| e.last_renewed_epoch);
        let Some(lru) = entries.into_iter().next() else {
            return Err(VectorStoreError::CapacityExceeded);
        };
        self.repo.delete(&lru.session_id).await?;
        self.backend.delete_store(&lru.vs_id).await?;
        Ok(())
    }

    /// Refresh the lease for `session_id` without touching its file set.
    pub async fn renew(&self, session_id: &SessionId, now: EpochSeconds) -> Result<(), VectorStoreError> {
        let Some(mut entry) = self.repo.get(session_id).await? else {
            return Err(VectorStoreError::NotFound(session_id.as_str().to_string()));
        };
        entry.renew(now, self.ttl_secs);
        self.repo.upsert(&entry).await
    }

    /// Sweep expired entries out of local storage, deleting the
    /// provider-side store too when `delete_on_evict` is configured (spec
    /// §4.5 `release_on_expiry`).
    pub async fn release_on_expiry(&self, now: EpochSeconds) -> Result<usize, VectorStoreError> {
        let entries = self.repo.list_all().await?;
        let mut released = 0;
        for entry in entries {
            if entry.is_expired(now) {
                self.repo.delete(&entry.session_id).await?;
                if self.delete_on_evict {
                    let _ = self.backend.delete_store(&entry.vs_id).await;
                }
                released += 1;
            }
        }
        Ok(released)
    }
}
