//! Vector-store entry record (spec §3, §4.5).

use crate::duration::EpochSeconds;
use crate::id::{SessionId, VectorStoreId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Local record of a provider-side vector index (spec §3).
///
/// Invariant: `vs_id` and `file_hashes` are persisted together in the same
/// transaction — a crash mid-upload must never leave `file_hashes`
/// recording a file that was never confirmed uploaded (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreEntry {
    /// Provider-assigned vector store id.
    pub vs_id: VectorStoreId,
    /// Session this store belongs to.
    pub session_id: SessionId,
    /// Content hashes of files confirmed uploaded.
    pub file_hashes: HashSet<String>,
    /// When this entry was first created.
    pub created_epoch: EpochSeconds,
    /// Last time the lease was renewed.
    pub last_renewed_epoch: EpochSeconds,
    /// When the lease expires absent renewal.
    pub expires_epoch: EpochSeconds,
}

impl VectorStoreEntry {
    /// A new entry with a fresh lease.
    pub fn new(
        vs_id: VectorStoreId,
        session_id: SessionId,
        now: EpochSeconds,
        ttl_secs: i64,
    ) -> Self {
        Self {
            vs_id,
            session_id,
            file_hashes: HashSet::new(),
            created_epoch: now,
            last_renewed_epoch: now,
            expires_epoch: now + ttl_secs,
        }
    }

    /// Whether the lease has lapsed as of `now`.
    pub fn is_expired(&self, now: EpochSeconds) -> bool {
        now > self.expires_epoch
    }

    /// Extend the lease to `now + ttl_secs`.
    pub fn renew(&mut self, now: EpochSeconds, ttl_secs: i64) {
        self.last_renewed_epoch = now;
        self.expires_epoch = now + ttl_secs;
    }

    /// Hashes requested by a call that are not yet uploaded (spec P7).
    pub fn missing(&self, requested: &HashSet<String>) -> HashSet<String> {
        requested.difference(&self.file_hashes).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_the_set_difference() {
        let mut e = VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 3600);
        e.file_hashes.insert("h1".into());
        let requested: HashSet<String> = ["h1".to_string(), "h2".to_string()].into_iter().collect();
        let missing = e.missing(&requested);
        assert_eq!(missing, ["h2".to_string()].into_iter().collect());
    }

    #[test]
    fn renew_extends_expiry() {
        let mut e = VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 100);
        assert_eq!(e.expires_epoch, 100);
        e.renew(50, 100);
        assert_eq!(e.expires_epoch, 150);
        assert_eq!(e.last_renewed_epoch, 50);
    }

    #[test]
    fn subset_upload_is_empty() {
        let mut e = VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 100);
        e.file_hashes.insert("h1".into());
        e.file_hashes.insert("h2".into());
        let requested: HashSet<String> = ["h1".to_string()].into_iter().collect();
        assert!(e.missing(&requested).is_empty());
    }
}
