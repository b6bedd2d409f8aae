//! SQLite-backed [`MemoryRepository`] (spec §4.9, §6).

use async_trait::async_trait;
use broker_memory::{MemoryError, MemoryRepository};
use broker_types::{MemoryEntry, MemoryId, SessionId};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// [`MemoryRepository`] backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqliteMemoryRepository {
    pool: SqlitePool,
}

impl SqliteMemoryRepository {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> MemoryEntry {
    MemoryEntry {
        memory_id: MemoryId::new(row.get::<String, _>("memory_id")),
        session_id: row.get::<Option<String>, _>("session_id").map(SessionId::new),
        tool_name: row.get("tool_name"),
        summary_text: row.get("summary_text"),
        embedding_handle: row.get("embedding_handle"),
        created_epoch: row.get("created_epoch"),
    }
}

#[async_trait]
impl MemoryRepository for SqliteMemoryRepository {
    async fn insert(&self, entry: &MemoryEntry) -> Result<(), MemoryError> {
        sqlx::query(
            "INSERT INTO memory_entries
                (memory_id, session_id, tool_name, summary_text, embedding_handle, created_epoch)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.memory_id.as_str())
        .bind(entry.session_id.as_ref().map(|s| s.as_str()))
        .bind(&entry.tool_name)
        .bind(&entry.summary_text)
        .bind(&entry.embedding_handle)
        .bind(entry.created_epoch)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Repository(Box::new(e)))?;
        Ok(())
    }

    async fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<MemoryEntry>, MemoryError> {
        let rows = sqlx::query(
            "SELECT memory_id, session_id, tool_name, summary_text, embedding_handle, created_epoch
             FROM memory_entries WHERE session_id = ? ORDER BY created_epoch DESC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::Repository(Box::new(e)))?;

        Ok(rows.into_iter().map(row_to_entry).collect())
    }

    async fn list_all(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        let rows = sqlx::query(
            "SELECT memory_id, session_id, tool_name, summary_text, embedding_handle, created_epoch
             FROM memory_entries ORDER BY created_epoch DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::Repository(Box::new(e)))?;

        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}
