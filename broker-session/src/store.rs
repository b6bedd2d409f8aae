//! SQLite-backed session continuity cache (spec §4.6).
//!
//! Grounded on the teacher's `layer0::state::StateStore` trait shape
//! (async get/upsert over a key) and `fourthplaces-rootsignal`'s
//! `sqlx`-based cache tables (row struct + `FromRow`, `INSERT ... ON
//! CONFLICT DO UPDATE` upsert), adapted from Postgres to SQLite.

use crate::error::SessionError;
use async_trait::async_trait;
use broker_types::{CompactedTurn, ContinuationKind, EpochSeconds, SessionId, SessionRecord};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;

/// Async key/value cache over [`SessionRecord`]s, keyed by [`SessionId`]
/// (spec §4.6 API: `get`/`upsert`/`touch`).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session's record, if one exists.
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, SessionError>;

    /// Atomically replace a session's record.
    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError>;

    /// Bump `last_seen_epoch` without touching anything else.
    async fn touch(&self, session_id: &SessionId, now: EpochSeconds) -> Result<(), SessionError>;

    /// Delete every record whose TTL has lapsed as of `now`; returns the
    /// count removed (spec §4.6: "TTL sweeps run periodically").
    async fn sweep_expired(&self, now: EpochSeconds) -> Result<u64, SessionError>;
}

/// [`SessionStore`] backed by a SQLite database opened in WAL mode (spec
/// §4.6: "backed by a local database with write-ahead logging").
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let row = sqlx::query(
            "SELECT session_id, provider_family, continuation_json, compacted_history_json,
                    vector_store_id, inline_fingerprints_json, last_seen_epoch, ttl_epoch
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        row_to_record(session_id, row)
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let continuation_json = serde_json::to_string(&record.continuation)
            .expect("ContinuationKind always serializes");
        let history_json = serde_json::to_string(&record.compacted_history)
            .expect("Vec<CompactedTurn> always serializes");
        let fingerprints_json = serde_json::to_string(&record.inline_file_fingerprints)
            .expect("HashSet<String> always serializes");

        sqlx::query(
            "INSERT INTO sessions
                (session_id, provider_family, continuation_json, compacted_history_json,
                 vector_store_id, inline_fingerprints_json, last_seen_epoch, ttl_epoch)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                provider_family = excluded.provider_family,
                continuation_json = excluded.continuation_json,
                compacted_history_json = excluded.compacted_history_json,
                vector_store_id = excluded.vector_store_id,
                inline_fingerprints_json = excluded.inline_fingerprints_json,
                last_seen_epoch = excluded.last_seen_epoch,
                ttl_epoch = excluded.ttl_epoch",
        )
        .bind(record.session_id.as_str())
        .bind(&record.provider_family)
        .bind(continuation_json)
        .bind(history_json)
        .bind(&record.vector_store_id)
        .bind(fingerprints_json)
        .bind(record.last_seen_epoch)
        .bind(record.ttl_epoch)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch(&self, session_id: &SessionId, now: EpochSeconds) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET last_seen_epoch = ? WHERE session_id = ?")
            .bind(now)
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sweep_expired(&self, now: EpochSeconds) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE ttl_epoch < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_record(
    session_id: &SessionId,
    row: sqlx::sqlite::SqliteRow,
) -> Result<Option<SessionRecord>, SessionError> {
    let corrupt = |message: String| SessionError::Corrupt {
        session_id: session_id.as_str().to_string(),
        message,
    };

    let continuation_json: String = row.try_get("continuation_json")?;
    let continuation: ContinuationKind =
        serde_json::from_str(&continuation_json).map_err(|e| corrupt(e.to_string()))?;

    let history_json: String = row.try_get("compacted_history_json")?;
    let compacted_history: Vec<CompactedTurn> =
        serde_json::from_str(&history_json).map_err(|e| corrupt(e.to_string()))?;

    let fingerprints_json: String = row.try_get("inline_fingerprints_json")?;
    let inline_file_fingerprints: HashSet<String> =
        serde_json::from_str(&fingerprints_json).map_err(|e| corrupt(e.to_string()))?;

    Ok(Some(SessionRecord {
        session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
        provider_family: row.try_get("provider_family")?,
        continuation,
        compacted_history,
        vector_store_id: row.try_get("vector_store_id")?,
        inline_file_fingerprints,
        last_seen_epoch: row.try_get("last_seen_epoch")?,
        ttl_epoch: row.try_get("ttl_epoch")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE sessions (
                session_id TEXT PRIMARY KEY,
                provider_family TEXT NOT NULL,
                continuation_json TEXT NOT NULL,
                compacted_history_json TEXT NOT NULL,
                vector_store_id TEXT,
                inline_fingerprints_json TEXT NOT NULL,
                last_seen_epoch INTEGER NOT NULL,
                ttl_epoch INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn get_missing_session_is_none() {
        let store = SqliteSessionStore::new(test_pool().await);
        assert!(store.get(&SessionId::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut record = SessionRecord::new(SessionId::new("s1"), "openai", 0, 3600);
        record.continuation = ContinuationKind::OpenAiResponseId("resp_1".into());
        record.inline_file_fingerprints.insert("hash1".into());

        store.upsert(&record).await.unwrap();
        let fetched = store.get(&record.session_id).await.unwrap().unwrap();

        assert_eq!(fetched.provider_family, "openai");
        assert_eq!(fetched.continuation, ContinuationKind::OpenAiResponseId("resp_1".into()));
        assert!(fetched.inline_file_fingerprints.contains("hash1"));
    }

    #[tokio::test]
    async fn upsert_is_atomic_replace() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut record = SessionRecord::new(SessionId::new("s1"), "openai", 0, 3600);
        store.upsert(&record).await.unwrap();

        record.provider_family = "anthropic".into();
        record.continuation = ContinuationKind::AnthropicHistoryOnly;
        store.upsert(&record).await.unwrap();

        let fetched = store.get(&record.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.provider_family, "anthropic");
        assert_eq!(fetched.continuation, ContinuationKind::AnthropicHistoryOnly);
    }

    #[tokio::test]
    async fn touch_bumps_last_seen_only() {
        let store = SqliteSessionStore::new(test_pool().await);
        let record = SessionRecord::new(SessionId::new("s1"), "openai", 0, 3600);
        store.upsert(&record).await.unwrap();

        store.touch(&record.session_id, 500).await.unwrap();
        let fetched = store.get(&record.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.last_seen_epoch, 500);
        assert_eq!(fetched.ttl_epoch, 3600);
    }

    #[tokio::test]
    async fn sweep_expired_removes_only_lapsed_records() {
        let store = SqliteSessionStore::new(test_pool().await);
        let fresh = SessionRecord::new(SessionId::new("fresh"), "openai", 0, 3600);
        let stale = SessionRecord::new(SessionId::new("stale"), "openai", 0, 10);
        store.upsert(&fresh).await.unwrap();
        store.upsert(&stale).await.unwrap();

        let removed = store.sweep_expired(100).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&fresh.session_id).await.unwrap().is_some());
        assert!(store.get(&stale.session_id).await.unwrap().is_none());
    }
}
