#![deny(missing_docs)]
//! Post-call conversation memory and its two retrieval tools (spec §4.9).
//!
//! Every successful call feeds a summary into a process-wide retrievable
//! store, fire-and-forget, via [`store::MemoryStore::store_in_background`].
//! Retrieval (`search_project_memory`, `search_session_attachments`)
//! delegates similarity search entirely to a provider-side index through
//! [`backend::MemoryBackend`] — this crate never ranks or embeds locally.

pub mod backend;
pub mod error;
pub mod repository;
pub mod store;
pub mod summarize;

pub use backend::{MemoryBackend, MemoryHit};
pub use error::MemoryError;
pub use repository::MemoryRepository;
pub use store::MemoryStore;
pub use summarize::{ConcatSummarizer, Summarizer};
