#![deny(missing_docs)]
//! Uniform call surface over upstream model providers and local services
//! (spec §4.7).
//!
//! One [`Adapter`] implementation per provider family lives here, each
//! grounded on the matching teacher crate's client/mapping split
//! (`agent-provider-anthropic`, `agent-provider-ollama`) and generalized to
//! the broker's abstract [`broker_types::Classify`] error taxonomy instead
//! of a provider-specific one. The dispatcher selects an implementation at
//! runtime by a tool descriptor's `provider_family`, so every adapter here
//! is held behind `Arc<dyn Adapter>`.

pub mod adapter;
pub mod error;
pub mod local;
pub mod ollama;
pub mod retry;

mod anthropic;
mod openai;

pub use adapter::{Adapter, AdapterRequest, AdapterResponse, ImageAttachment, Usage};
pub use anthropic::AnthropicAdapter;
pub use error::AdapterError;
pub use local::{LocalCliAdapter, TokenCounterAdapter};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use retry::{with_backoff, BackoffPolicy};
