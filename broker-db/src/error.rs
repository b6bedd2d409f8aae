//! Errors from pool setup and migrations (spec §6, §9, P9).

use broker_types::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from opening the database or running migrations.
///
/// Every variant classifies as [`ErrorKind::Initialization`] — per spec
/// §7, a failure here happens at startup and is the one class of error
/// allowed to abort the process rather than surface as `isError: true`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open or configure the SQLite pool.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Configured database path.
        path: String,
        /// Underlying sqlx error.
        #[source]
        source: sqlx::Error,
    },

    /// A migration file's SQL failed to apply; the pre-migration backup
    /// has been restored.
    #[error("migration {version} ({name}) failed and was rolled back: {source}")]
    MigrationFailed {
        /// Numeric version of the failed migration.
        version: u32,
        /// Migration's descriptive name.
        name: String,
        /// Underlying sqlx error.
        #[source]
        source: sqlx::Error,
    },

    /// Migration filenames did not parse as `NNN_description.sql`.
    #[error("malformed migration filename: {0}")]
    MalformedFilename(String),

    /// Backing up or restoring the database file failed.
    #[error("database backup/restore failed: {0}")]
    Backup(#[from] std::io::Error),
}

impl Classify for DbError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Initialization
    }
}
