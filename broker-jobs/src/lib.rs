#![deny(missing_docs)]
//! Persistent single-writer async job queue and worker loop (spec §3, §4.8).
//!
//! Grounded on the original `mcp_the_force` job queue's schema and
//! operation set (`enqueue`, `claim_next_pending`, `complete`, `fail`,
//! `cancel`, `get`, `cleanup_expired`), reimplemented against `sqlx`
//! SQLite with `RETURNING` for the atomic single-writer claim, and a
//! worker loop generalized from the teacher's
//! `neuron-orch-local::LocalOrch::dispatch_many` concurrent-task pattern.

pub mod error;
pub mod queue;
pub mod worker;

pub use error::JobError;
pub use queue::{JobQueue, SqliteJobQueue};
pub use worker::{JobHandler, RegistryJobHandler, Worker};
