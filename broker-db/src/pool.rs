//! Opens the broker's single SQLite database in WAL mode (spec §6, §9).
//!
//! Grounded on the teacher's `neuron-state-fs` convention of a single
//! configurable data-file path; here the file holds every persistent
//! table (sessions, vector-store entries, jobs, memory pointers) rather
//! than one file per subsystem, per spec §6: "The SQL database file...
//! is shared."

use crate::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteJournalMode};
use sqlx::sqlite::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Open (creating if absent) a SQLite pool at `path`, configured for
/// write-ahead logging (spec §6: "backed by a local database with
/// write-ahead logging; all writes wrapped in a transaction").
pub async fn open_pool(path: impl AsRef<Path>) -> Result<SqlitePool, DbError> {
    let path = path.as_ref();
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .map_err(|source| DbError::Open {
            path: path.display().to_string(),
            source,
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|source| DbError::Open {
            path: path.display().to_string(),
            source,
        })
}
