//! Anthropic-family adapter (spec §4.7).
//!
//! Grounded on the teacher's `agent-provider-anthropic` client/mapping
//! split: a thin builder struct plus a `call` that posts to the Messages
//! API and maps the response into the uniform [`AdapterResponse`]. The
//! Anthropic Messages API has no native continuation id, so per spec §4.6
//! this adapter reports [`broker_types::ContinuationKind::AnthropicHistoryOnly`]
//! and relies entirely on the session's compacted history for continuity.

use crate::adapter::{Adapter, AdapterRequest, AdapterResponse, Usage};
use crate::error::AdapterError;
use crate::retry::{with_backoff, BackoffPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicAdapter {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl AnthropicAdapter {
    /// Build a client with the production base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the base URL (for tests against a local mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct UsageResponse {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError> {
        let model = request.tool.model_name.clone();
        let max_tokens = request
            .adapter_kwargs
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(4096);
        let temperature = request.adapter_kwargs.get("temperature").and_then(|v| v.as_f64());

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": request.rendered_prompt}],
        });
        if let Some(temperature) = temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        let response = with_backoff(self.backoff, &cancel_signal, || {
            let body = body.clone();
            async {
                tokio::select! {
                    result = self
                        .client
                        .post(self.messages_url())
                        .header("x-api-key", &self.api_key)
                        .header("anthropic-version", DEFAULT_ANTHROPIC_VERSION)
                        .json(&body)
                        .send() => send_and_map(result).await,
                    _ = cancel_signal.cancelled() => Err(AdapterError::Cancelled),
                }
            }
        })
        .await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(AdapterResponse {
            text,
            continuation_token: None,
            structured: None,
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }

    fn provider_family(&self) -> &'static str {
        "anthropic"
    }
}

async fn send_and_map(result: Result<reqwest::Response, reqwest::Error>) -> Result<MessagesResponse, AdapterError> {
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
        .json::<MessagesResponse>()
        .await
        .map_err(|e| AdapterError::Internal(format!("malformed Anthropic response: {e}")))
}
