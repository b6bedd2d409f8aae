//! Local Ollama adapter (spec §4.7).
//!
//! Grounded directly on the teacher's `agent-provider-ollama::Ollama`
//! builder: same defaults, same `/api/chat` endpoint, same `keep_alive`
//! knob. Ollama has no continuation id and no rate limiting of its own,
//! so this adapter reports `ContinuationKind::Opaque` territory is left
//! to the caller (it never claims a family other than `"ollama"`) and
//! still goes through [`crate::retry::with_backoff`] for the connection
//! churn a local model server can produce under load.

use crate::adapter::{Adapter, AdapterRequest, AdapterResponse};
use crate::error::AdapterError;
use crate::retry::{with_backoff, BackoffPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for the Ollama Chat API.
pub struct OllamaAdapter {
    model: String,
    base_url: String,
    keep_alive: Option<String>,
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl OllamaAdapter {
    /// Create a client with Ollama's own defaults.
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            keep_alive: None,
            client: reqwest::Client::new(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the default model used when a tool's `model_name` is empty.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the keep_alive duration for model memory residency.
    pub fn keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.keep_alive = Some(duration.into());
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl Adapter for OllamaAdapter {
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError> {
        let model = if request.tool.model_name.is_empty() {
            self.model.clone()
        } else {
            request.tool.model_name.clone()
        };

        let mut body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": request.rendered_prompt}],
            "stream": false,
        });
        if let Some(keep_alive) = &self.keep_alive {
            body["keep_alive"] = serde_json::json!(keep_alive);
        }
        if let Some(temperature) = request.adapter_kwargs.get("temperature") {
            body["options"] = serde_json::json!({"temperature": temperature});
        }

        let result = with_backoff(self.backoff, &cancel_signal, || {
            let body = body.clone();
            async {
                tokio::select! {
                    result = self.client.post(self.chat_url()).json(&body).send() => send_and_map(result).await,
                    _ = cancel_signal.cancelled() => Err(AdapterError::Cancelled),
                }
            }
        })
        .await?;

        Ok(AdapterResponse {
            text: result.message.content,
            continuation_token: None,
            structured: None,
            usage: match (result.prompt_eval_count, result.eval_count) {
                (Some(p), Some(c)) => Some(crate::adapter::Usage {
                    prompt_tokens: p,
                    completion_tokens: c,
                }),
                _ => None,
            },
        })
    }

    fn provider_family(&self) -> &'static str {
        "ollama"
    }
}

async fn send_and_map(result: Result<reqwest::Response, reqwest::Error>) -> Result<ChatResponse, AdapterError> {
    let response = result.map_err(|e| {
        if e.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::TransientNetwork(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::from_status(status.as_u16(), body));
    }

    response
        .json::<ChatResponse>()
        .await
        .map_err(|e| AdapterError::Internal(format!("malformed Ollama response: {e}")))
}
