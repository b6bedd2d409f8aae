//! The uniform adapter call surface (spec §4.7).
//!
//! Grounded on the teacher's `neuron_types::traits::Provider`, but made
//! object-safe (`async_trait` instead of RPITIT) because the dispatcher
//! holds adapters behind `Arc<dyn Adapter>` chosen dynamically by tool
//! descriptor, the same reason `broker_tool::ToolDyn` is `async_trait`
//! instead of RPITIT.

use crate::error::AdapterError;
use async_trait::async_trait;
use broker_types::{SessionRecord, ToolDescriptor, VectorStoreId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A binary attachment carried alongside the prompt for vision-capable
/// tools (spec §4.4: "binaries... may still be attached as images").
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// Original path, for logging only.
    pub path: String,
    /// MIME type (e.g. `"image/png"`).
    pub mime_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// Token/cost accounting returned by a provider, when it reports one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced by the completion.
    pub completion_tokens: u64,
}

/// Everything an adapter needs to perform one call (spec §4.7 `call`
/// signature).
pub struct AdapterRequest<'a> {
    /// The tool descriptor this call targets.
    pub tool: &'a ToolDescriptor,
    /// Fully rendered user prompt (prompt-routed params concatenated per
    /// the tool's template, plus the context tree preamble).
    pub rendered_prompt: String,
    /// Adapter-routed keyword arguments (`temperature`, `reasoning_effort`, ...).
    pub adapter_kwargs: serde_json::Map<String, serde_json::Value>,
    /// Vector store ids backing this call's overflow set, if any.
    pub vector_store_ids: Vec<VectorStoreId>,
    /// Binary attachments eligible for vision.
    pub images: Vec<ImageAttachment>,
    /// JSON Schema the response must validate against, if the tool
    /// requested structured output.
    pub structured_output_schema: Option<serde_json::Value>,
    /// The session record for continuity, if this call declared a
    /// `session_id` and one already exists.
    pub session: Option<&'a SessionRecord>,
}

/// What an adapter call returns (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct AdapterResponse {
    /// Free-form response text.
    pub text: String,
    /// Opaque continuation token for the next turn in this session, if the
    /// provider returned one.
    pub continuation_token: Option<String>,
    /// Structured output, if a schema was requested and validation passed.
    pub structured: Option<serde_json::Value>,
    /// Usage accounting, if the provider reported it.
    pub usage: Option<Usage>,
}

/// Uniform call surface over upstream providers and local services (spec
/// §4.7).
///
/// Implementors must honor `cancel_signal` at every suspension point,
/// never mutate `request`, retry transient/rate-limited errors with
/// bounded backoff (the default is provided by [`crate::retry::with_backoff`],
/// not baked into this trait so local-service adapters can opt out), and
/// either validate structured output or raise
/// [`AdapterError::UnsupportedStructuredOutput`] up front.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Perform one call.
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError>;

    /// The provider family this adapter serves (`"openai"`, `"anthropic"`,
    /// `"gemini"`, `"ollama"`, `"local"`), used for session
    /// family-mismatch detection (spec §4.6).
    fn provider_family(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "chat_with_x".into(),
            description: "desc".into(),
            input_schema: serde_json::json!({"type": "object"}),
            capabilities: HashSet::new(),
            params: vec![],
            provider_family: "openai".into(),
            model_name: "gpt-5".into(),
            context_window: 128_000,
            default_timeout_ms: 60_000,
        }
    }

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        async fn call(
            &self,
            request: AdapterRequest<'_>,
            _cancel_signal: CancellationToken,
        ) -> Result<AdapterResponse, AdapterError> {
            Ok(AdapterResponse {
                text: request.rendered_prompt,
                ..Default::default()
            })
        }

        fn provider_family(&self) -> &'static str {
            "local"
        }
    }

    #[tokio::test]
    async fn adapter_is_object_safe() {
        let adapter: Box<dyn Adapter> = Box::new(EchoAdapter);
        let descriptor = descriptor();
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "hi".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };
        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "hi");
        assert_eq!(adapter.provider_family(), "local");
    }
}
