#![deny(missing_docs)]
//! SQLite-backed session continuity cache (spec §4.6).

pub mod error;
pub mod store;

pub use error::SessionError;
pub use store::{SessionStore, SqliteSessionStore};
