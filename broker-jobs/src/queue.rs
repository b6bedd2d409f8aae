//! SQLite-backed job table and the atomic claim operation (spec §3, §4.8).
//!
//! Grounded on the `layer0::state::StateStore` get/upsert shape used
//! throughout the teacher (`broker-session::SqliteSessionStore` follows the
//! same pattern for session records), specialized here to the job state
//! machine: [`JobQueue::claim_next_pending`] is the one operation with a
//! true concurrency hazard, handled with a single `UPDATE ... RETURNING`
//! statement so a multi-worker deployment never double-claims a row (spec
//! §4.8: "the update must observe no race with another worker claiming the
//! same row").

use crate::error::JobError;
use async_trait::async_trait;
use broker_types::{EpochSeconds, JobId, JobRecord, JobStatus, ToolName};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Persistent queue of [`JobRecord`]s (spec §4.8 operation set).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a fresh pending job and return its id.
    async fn enqueue(&self, job: JobRecord) -> Result<JobId, JobError>;

    /// Atomically claim the oldest pending job, transitioning it to
    /// `running`. Returns `None` if no job is pending.
    async fn claim_next_pending(&self, now: EpochSeconds) -> Result<Option<JobRecord>, JobError>;

    /// Mark a job completed with a result. A no-op if the job is already
    /// in a terminal state (spec P8).
    async fn complete(&self, job_id: &JobId, result: serde_json::Value, now: EpochSeconds) -> Result<(), JobError>;

    /// Mark a job failed with an error message. A no-op if the job is
    /// already in a terminal state (spec P8).
    async fn fail(&self, job_id: &JobId, error_text: impl Into<String> + Send, now: EpochSeconds) -> Result<(), JobError>;

    /// Mark a job cancelled. A no-op if the job is already in a terminal
    /// state (spec P8).
    async fn cancel(&self, job_id: &JobId, now: EpochSeconds) -> Result<(), JobError>;

    /// Record progress on a running job, for `poll_job` responses.
    async fn report_progress(
        &self,
        job_id: &JobId,
        progress: f64,
        progress_msg: Option<String>,
        now: EpochSeconds,
    ) -> Result<(), JobError>;

    /// Fetch a job's current record.
    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobError>;

    /// Delete every row whose `expires_at` has lapsed; returns the count
    /// removed.
    async fn cleanup_expired(&self, now: EpochSeconds) -> Result<u64, JobError>;
}

/// [`JobQueue`] backed by a SQLite pool, as spec §6's "Persisted state
/// layout" requires for every table in the broker's database.
#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: JobRecord) -> Result<JobId, JobError> {
        let payload_json = serde_json::to_string(&job.payload).expect("JSON value always serializes");
        sqlx::query(
            "INSERT INTO jobs
                (job_id, tool_id, payload_json, status, attempt_count, max_attempts,
                 max_runtime_s, updated_at, expires_at)
             VALUES (?, ?, ?, 'pending', 0, ?, ?, ?, ?)",
        )
        .bind(job.job_id.as_str())
        .bind(job.tool_id.as_str())
        .bind(payload_json)
        .bind(job.max_attempts)
        .bind(job.max_runtime_s)
        .bind(job.updated_at)
        .bind(job.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(job.job_id)
    }

    async fn claim_next_pending(&self, now: EpochSeconds) -> Result<Option<JobRecord>, JobError> {
        let row = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = ?, updated_at = ?, attempt_count = attempt_count + 1
             WHERE job_id = (
                SELECT job_id FROM jobs WHERE status = 'pending' ORDER BY updated_at ASC LIMIT 1
             )
             RETURNING job_id, tool_id, payload_json, status, result_json, progress, progress_msg,
                       error_text, attempt_count, max_attempts, max_runtime_s, started_at, updated_at, expires_at",
        )
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn complete(&self, job_id: &JobId, result: serde_json::Value, now: EpochSeconds) -> Result<(), JobError> {
        let result_json = serde_json::to_string(&result).expect("JSON value always serializes");
        sqlx::query(
            "UPDATE jobs SET status = 'completed', result_json = ?, updated_at = ?
             WHERE job_id = ? AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(result_json)
        .bind(now)
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, job_id: &JobId, error_text: impl Into<String> + Send, now: EpochSeconds) -> Result<(), JobError> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error_text = ?, updated_at = ?
             WHERE job_id = ? AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(error_text.into())
        .bind(now)
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel(&self, job_id: &JobId, now: EpochSeconds) -> Result<(), JobError> {
        sqlx::query(
            "UPDATE jobs SET status = 'cancelled', updated_at = ?
             WHERE job_id = ? AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(now)
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn report_progress(
        &self,
        job_id: &JobId,
        progress: f64,
        progress_msg: Option<String>,
        now: EpochSeconds,
    ) -> Result<(), JobError> {
        sqlx::query(
            "UPDATE jobs SET progress = ?, progress_msg = ?, updated_at = ?
             WHERE job_id = ? AND status = 'running'",
        )
        .bind(progress)
        .bind(progress_msg)
        .bind(now)
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>, JobError> {
        let row = sqlx::query(
            "SELECT job_id, tool_id, payload_json, status, result_json, progress, progress_msg,
                    error_text, attempt_count, max_attempts, max_runtime_s, started_at, updated_at, expires_at
             FROM jobs WHERE job_id = ?",
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_record).transpose()
    }

    async fn cleanup_expired(&self, now: EpochSeconds) -> Result<u64, JobError> {
        let result = sqlx::query("DELETE FROM jobs WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<JobRecord, JobError> {
    let status_str: String = row.try_get("status")?;
    let status = match status_str.as_str() {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        other => return Err(JobError::Corrupt(format!("unknown job status `{other}`"))),
    };

    let payload_json: String = row.try_get("payload_json")?;
    let payload = serde_json::from_str(&payload_json).map_err(|e| JobError::Corrupt(e.to_string()))?;

    let result_json: Option<String> = row.try_get("result_json")?;
    let result = result_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| JobError::Corrupt(e.to_string()))?;

    Ok(JobRecord {
        job_id: JobId::new(row.try_get::<String, _>("job_id")?),
        tool_id: ToolName::new(row.try_get::<String, _>("tool_id")?),
        payload,
        status,
        result,
        progress: row.try_get("progress")?,
        progress_msg: row.try_get("progress_msg")?,
        error_text: row.try_get("error_text")?,
        attempt_count: row.try_get::<i64, _>("attempt_count")? as u32,
        max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
        max_runtime_s: row.try_get::<i64, _>("max_runtime_s")? as u32,
        started_at: row.try_get("started_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE jobs (
                job_id TEXT PRIMARY KEY,
                tool_id TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                status TEXT NOT NULL,
                result_json TEXT,
                progress REAL,
                progress_msg TEXT,
                error_text TEXT,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 1,
                max_runtime_s INTEGER NOT NULL,
                started_at INTEGER,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn sample(job_id: &str, now: EpochSeconds) -> JobRecord {
        JobRecord::new(
            JobId::new(job_id),
            ToolName::new("count_project_tokens"),
            serde_json::json!({"items": ["README.md"]}),
            60,
            now,
            3600,
        )
    }

    #[tokio::test]
    async fn enqueue_then_get_is_pending() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();
        let job = queue.get(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn claim_next_pending_transitions_to_running() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();

        let claimed = queue.claim_next_pending(10).await.unwrap().unwrap();
        assert_eq!(claimed.job_id, JobId::new("j1"));
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.started_at, Some(10));
        assert_eq!(claimed.attempt_count, 1);
    }

    #[tokio::test]
    async fn claim_next_pending_is_fifo_by_updated_at() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("first", 0)).await.unwrap();
        queue.enqueue(sample("second", 1)).await.unwrap();

        let claimed = queue.claim_next_pending(10).await.unwrap().unwrap();
        assert_eq!(claimed.job_id, JobId::new("first"));
    }

    #[tokio::test]
    async fn claim_next_pending_empty_queue_is_none() {
        let queue = SqliteJobQueue::new(test_pool().await);
        assert!(queue.claim_next_pending(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_sets_result_and_terminal_status() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();
        queue.claim_next_pending(1).await.unwrap();

        queue.complete(&JobId::new("j1"), serde_json::json!(42), 5).await.unwrap();
        let job = queue.get(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::json!(42)));
    }

    #[tokio::test]
    async fn terminal_transitions_are_absorbing_no_ops() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();
        queue.claim_next_pending(1).await.unwrap();
        queue.complete(&JobId::new("j1"), serde_json::json!(1), 5).await.unwrap();

        // Second completion attempt and a cancel both land on a job that
        // is already terminal and must be no-ops (spec P8).
        queue.complete(&JobId::new("j1"), serde_json::json!(999), 6).await.unwrap();
        queue.cancel(&JobId::new("j1"), 7).await.unwrap();

        let job = queue.get(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn cancel_pending_job_is_cancelled() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();
        queue.cancel(&JobId::new("j1"), 5).await.unwrap();
        let job = queue.get(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn report_progress_only_applies_while_running() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("j1", 0)).await.unwrap();

        // Not running yet: progress report is a no-op.
        queue.report_progress(&JobId::new("j1"), 0.5, Some("halfway".into()), 1).await.unwrap();
        assert!(queue.get(&JobId::new("j1")).await.unwrap().unwrap().progress.is_none());

        queue.claim_next_pending(2).await.unwrap();
        queue.report_progress(&JobId::new("j1"), 0.5, Some("halfway".into()), 3).await.unwrap();
        let job = queue.get(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(job.progress, Some(0.5));
        assert_eq!(job.progress_msg, Some("halfway".to_string()));
    }

    #[tokio::test]
    async fn cleanup_expired_removes_only_lapsed_rows() {
        let queue = SqliteJobQueue::new(test_pool().await);
        queue.enqueue(sample("fresh", 0)).await.unwrap();
        let mut stale = sample("stale", 0);
        stale.expires_at = 5;
        queue.enqueue(stale).await.unwrap();

        let removed = queue.cleanup_expired(100).await.unwrap();
        assert_eq!(removed, 1);
        assert!(queue.get(&JobId::new("fresh")).await.unwrap().is_some());
        assert!(queue.get(&JobId::new("stale")).await.unwrap().is_none());
    }
}
