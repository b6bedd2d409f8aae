#![deny(missing_docs)]
//! Per-session provider-side vector store lease management.
//!
//! Grounded on the teacher's `neuron-state-fs::FsStore` content-addressed
//! identity (here, file content hashes instead of scope/key hashes) and
//! the `original_source/mcp_the_force` vector-store test suite's
//! acquire/renew/capacity semantics.

pub mod backend;
pub mod error;
pub mod manager;
pub mod repository;

pub use backend::VectorStoreBackend;
pub use error::VectorStoreError;
pub use manager::{AcquireOutcome, VectorStoreManager, DEFAULT_CAPACITY_THRESHOLD};
pub use repository::VectorStoreRepository;
