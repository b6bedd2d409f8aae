#![deny(missing_docs)]
//! Shared SQLite persistence: pool setup, the migration runner, and the
//! repository implementations not already supplied by their owning crate
//! (spec §6, §9).
//!
//! `broker-session::SqliteSessionStore` and `broker-jobs::SqliteJobQueue`
//! implement their own tables directly since those crates own the
//! corresponding state machine; this crate supplies the remaining two
//! (`vector_store_entries`, `memory_entries`) plus the one thing every
//! table needs in common — an opened, migrated pool.

pub mod error;
pub mod memory_repository;
pub mod migrations;
pub mod pool;
pub mod vectorstore_repository;

pub use error::DbError;
pub use memory_repository::SqliteMemoryRepository;
pub use migrations::{rollback_to, run_migrations, status};
pub use pool::open_pool;
pub use vectorstore_repository::SqliteVectorStoreRepository;
