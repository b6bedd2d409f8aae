//! Numbered migration runner with file-copy backup/restore (spec §6, §9,
//! P9).
//!
//! Grounded on spec §6's explicit migration contract: "a migration runner
//! applies numbered migration files in order, takes a file-copy backup
//! before each migration, and restores from backup on failure. Migration
//! filenames encode version numbers (`NNN_description.sql`) and optional
//! rollback siblings (`NNN_description_rollback.sql`)." Migrations are
//! embedded at compile time with `include_str!` rather than read from a
//! directory at runtime, since the set of migrations a given build of the
//! broker knows how to apply is fixed at build time.

use crate::error::DbError;
use crate::pool::open_pool;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};

/// One numbered migration.
struct Migration {
    version: u32,
    name: &'static str,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        up_sql: include_str!("migrations/001_initial_schema.sql"),
        down_sql: include_str!("migrations/001_initial_schema_rollback.sql"),
    },
    Migration {
        version: 2,
        name: "memory_tool_name_index",
        up_sql: include_str!("migrations/002_memory_tool_name_index.sql"),
        down_sql: include_str!("migrations/002_memory_tool_name_index_rollback.sql"),
    },
];

/// Open the database at `db_path`, applying any migrations newer than the
/// schema's current version, and return the ready-to-use pool.
pub async fn run_migrations(db_path: impl AsRef<Path>) -> Result<SqlitePool, DbError> {
    let db_path = db_path.as_ref().to_path_buf();
    let mut pool = open_pool(&db_path).await?;
    ensure_migration_table(&pool).await?;

    let current = current_version(&pool).await?;
    let mut pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    pending.sort_by_key(|m| m.version);

    for migration in pending {
        let backup_path = backup_path_for(&db_path);
        std::fs::copy(&db_path, &backup_path)?;

        match apply(&pool, migration).await {
            Ok(()) => {
                let _ = std::fs::remove_file(&backup_path);
            }
            Err(source) => {
                pool.close().await;
                std::fs::copy(&backup_path, &db_path)?;
                let _ = std::fs::remove_file(&backup_path);
                return Err(DbError::MigrationFailed {
                    version: migration.version,
                    name: migration.name.to_string(),
                    source,
                });
            }
        }
    }

    Ok(pool)
}

/// Report the highest applied migration version without applying
/// anything (used by a `migrate-status` CLI surface).
pub async fn status(db_path: impl AsRef<Path>) -> Result<u32, DbError> {
    let pool = open_pool(db_path).await?;
    ensure_migration_table(&pool).await?;
    current_version(&pool).await
}

/// Roll back the schema to `target_version` by running rollback scripts
/// for every applied migration above it, highest version first.
pub async fn rollback_to(db_path: impl AsRef<Path>, target_version: u32) -> Result<(), DbError> {
    let db_path = db_path.as_ref().to_path_buf();
    let mut pool = open_pool(&db_path).await?;
    ensure_migration_table(&pool).await?;

    let current = current_version(&pool).await?;
    let mut to_undo: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > target_version && m.version <= current)
        .collect();
    to_undo.sort_by_key(|m| std::cmp::Reverse(m.version));

    for migration in to_undo {
        let backup_path = backup_path_for(&db_path);
        std::fs::copy(&db_path, &backup_path)?;

        match apply_rollback(&pool, migration).await {
            Ok(()) => {
                let _ = std::fs::remove_file(&backup_path);
            }
            Err(source) => {
                pool.close().await;
                std::fs::copy(&backup_path, &db_path)?;
                let _ = std::fs::remove_file(&backup_path);
                return Err(DbError::MigrationFailed {
                    version: migration.version,
                    name: migration.name.to_string(),
                    source,
                });
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn backup_path_for(db_path: &Path) -> PathBuf {
    let mut backup = db_path.as_os_str().to_owned();
    backup.push(".bak");
    PathBuf::from(backup)
}

async fn ensure_migration_table(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch())
        )",
    )
    .execute(pool)
    .await
    .map_err(|source| DbError::Open {
        path: "schema_migrations".into(),
        source,
    })?;
    Ok(())
}

async fn current_version(pool: &SqlitePool) -> Result<u32, DbError> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|source| DbError::Open {
            path: "schema_migrations".into(),
            source,
        })?;
    Ok(row.0.unwrap_or(0) as u32)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    execute_script(&mut tx, migration.up_sql).await?;
    sqlx::query("INSERT INTO schema_migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

async fn apply_rollback(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    execute_script(&mut tx, migration.down_sql).await?;
    sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

/// Run every `;`-separated statement in `script` in order. Migration
/// files in this crate never embed a literal semicolon inside a string,
/// so a naive split is sufficient.
async fn execute_script(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, script: &str) -> Result<(), sqlx::Error> {
    for statement in script.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(&mut **tx).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_database_applies_every_migration() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("broker.sqlite");

        let pool = run_migrations(&db_path).await.unwrap();
        let version = current_version(&pool).await.unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);

        let tables: Vec<(String,)> = sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"sessions"));
        assert!(names.contains(&"jobs"));
        assert!(names.contains(&"vector_store_entries"));
        assert!(names.contains(&"memory_entries"));
    }

    #[tokio::test]
    async fn re_running_migrations_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("broker.sqlite");

        run_migrations(&db_path).await.unwrap().close().await;
        let pool = run_migrations(&db_path).await.unwrap();
        let version = current_version(&pool).await.unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }

    #[tokio::test]
    async fn status_reports_current_version_without_applying() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("broker.sqlite");

        assert_eq!(status(&db_path).await.unwrap(), 0);
        run_migrations(&db_path).await.unwrap().close().await;
        assert_eq!(status(&db_path).await.unwrap(), MIGRATIONS.last().unwrap().version);
    }

    #[tokio::test]
    async fn rollback_undoes_migrations_above_target() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("broker.sqlite");

        run_migrations(&db_path).await.unwrap().close().await;
        rollback_to(&db_path, 1).await.unwrap();
        assert_eq!(status(&db_path).await.unwrap(), 1);

        let pool = open_pool(&db_path).await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_memory_entries_tool_name'")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(tables.is_empty());
    }
}
