#![deny(missing_docs)]
//! Tool registry and parameter router.
//!
//! Mirrors the teacher's `neuron-tool` crate: an object-safe `ToolDyn` trait
//! stored behind `Arc` in a `ToolRegistry`, plus the parameter router spec.md
//! §4.3 requires on top of it.

pub mod error;
pub mod registry;
pub mod router;

pub use error::ToolError;
pub use registry::{ToolDyn, ToolRegistry};
pub use router::split_args;
