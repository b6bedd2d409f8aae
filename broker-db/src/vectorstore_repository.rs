//! SQLite-backed [`VectorStoreRepository`] (spec §4.5, §6).
//!
//! Follows the same row-struct-free, hand-bound-query convention as
//! `broker-session::SqliteSessionStore` and `broker-jobs::SqliteJobQueue`.

use async_trait::async_trait;
use broker_types::{SessionId, VectorStoreEntry, VectorStoreId};
use broker_vectorstore::{VectorStoreError, VectorStoreRepository};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;

/// [`VectorStoreRepository`] backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqliteVectorStoreRepository {
    pool: SqlitePool,
}

impl SqliteVectorStoreRepository {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStoreRepository for SqliteVectorStoreRepository {
    async fn get(&self, session_id: &SessionId) -> Result<Option<VectorStoreEntry>, VectorStoreError> {
        let row = sqlx::query(
            "SELECT vs_id, file_hashes_json, created_epoch, last_renewed_epoch, expires_epoch
             FROM vector_store_entries WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Repository(Box::new(e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let file_hashes_json: String = row.get("file_hashes_json");
        let file_hashes: HashSet<String> =
            serde_json::from_str(&file_hashes_json).map_err(|e| VectorStoreError::Repository(Box::new(e)))?;

        Ok(Some(VectorStoreEntry {
            vs_id: VectorStoreId::new(row.get::<String, _>("vs_id")),
            session_id: session_id.clone(),
            file_hashes,
            created_epoch: row.get("created_epoch"),
            last_renewed_epoch: row.get("last_renewed_epoch"),
            expires_epoch: row.get("expires_epoch"),
        }))
    }

    async fn upsert(&self, entry: &VectorStoreEntry) -> Result<(), VectorStoreError> {
        let file_hashes_json =
            serde_json::to_string(&entry.file_hashes).expect("HashSet<String> always serializes");

        sqlx::query(
            "INSERT INTO vector_store_entries
                (session_id, vs_id, file_hashes_json, created_epoch, last_renewed_epoch, expires_epoch)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                vs_id = excluded.vs_id,
                file_hashes_json = excluded.file_hashes_json,
                created_epoch = excluded.created_epoch,
                last_renewed_epoch = excluded.last_renewed_epoch,
                expires_epoch = excluded.expires_epoch",
        )
        .bind(entry.session_id.as_str())
        .bind(entry.vs_id.as_str())
        .bind(file_hashes_json)
        .bind(entry.created_epoch)
        .bind(entry.last_renewed_epoch)
        .bind(entry.expires_epoch)
        .execute(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Repository(Box::new(e)))?;

        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), VectorStoreError> {
        sqlx::query("DELETE FROM vector_store_entries WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Repository(Box::new(e)))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<VectorStoreEntry>, VectorStoreError> {
        let rows = sqlx::query(
            "SELECT session_id, vs_id, file_hashes_json, created_epoch, last_renewed_epoch, expires_epoch
             FROM vector_store_entries",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Repository(Box::new(e)))?;

        rows.into_iter()
            .map(|row| {
                let file_hashes_json: String = row.get("file_hashes_json");
                let file_hashes: HashSet<String> = serde_json::from_str(&file_hashes_json)
                    .map_err(|e| VectorStoreError::Repository(Box::new(e)))?;
                Ok(VectorStoreEntry {
                    vs_id: VectorStoreId::new(row.get::<String, _>("vs_id")),
                    session_id: SessionId::new(row.get::<String, _>("session_id")),
                    file_hashes,
                    created_epoch: row.get("created_epoch"),
                    last_renewed_epoch: row.get("last_renewed_epoch"),
                    expires_epoch: row.get("expires_epoch"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let pool = run_migrations(dir.path().join("broker.sqlite")).await.unwrap();
        let repo = SqliteVectorStoreRepository::new(pool);

        let mut entry = VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 3600);
        entry.file_hashes.insert("h1".into());
        repo.upsert(&entry).await.unwrap();

        let fetched = repo.get(&SessionId::new("s1")).await.unwrap().unwrap();
        assert_eq!(fetched.vs_id, VectorStoreId::new("vs1"));
        assert!(fetched.file_hashes.contains("h1"));
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let pool = run_migrations(dir.path().join("broker.sqlite")).await.unwrap();
        let repo = SqliteVectorStoreRepository::new(pool);

        let entry = VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 3600);
        repo.upsert(&entry).await.unwrap();
        repo.delete(&SessionId::new("s1")).await.unwrap();

        assert!(repo.get(&SessionId::new("s1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_all_returns_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let pool = run_migrations(dir.path().join("broker.sqlite")).await.unwrap();
        let repo = SqliteVectorStoreRepository::new(pool);

        repo.upsert(&VectorStoreEntry::new(VectorStoreId::new("vs1"), SessionId::new("s1"), 0, 3600))
            .await
            .unwrap();
        repo.upsert(&VectorStoreEntry::new(VectorStoreId::new("vs2"), SessionId::new("s2"), 0, 3600))
            .await
            .unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }
}
