#![deny(missing_docs)]
//! JSON-RPC framer and request dispatcher for the MCP stdio transport
//! (spec §4.1, §4.2).
//!
//! Deliberately hand-rolled rather than built on `rmcp`'s high-level
//! `ServerHandler` (the teacher's `neuron-mcp::server` approach): the
//! per-request cancellation table and write-after-disconnect suppression
//! this crate provides need lower-level control over the read/write halves
//! than `ServerHandler`'s request/response model exposes. See `DESIGN.md`.

pub mod dispatcher;
pub mod error;
pub mod transport;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::McpError;
pub use transport::{MessageReader, PeerSink, DEFAULT_MAX_LINE_BYTES};
pub use types::{InboundMessage, RawRequestId};
