//! OpenAI-family adapter (spec §4.7).
//!
//! The Responses API returns a `response_id` that lets the next turn
//! resume server-side (spec §4.6); this is the provider family the
//! `ContinuationKind::OpenAiResponseId` variant exists for.

use crate::adapter::{Adapter, AdapterRequest, AdapterResponse, Usage};
use crate::error::AdapterError;
use crate::retry::{with_backoff, BackoffPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI Responses API.
pub struct OpenAiAdapter {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl OpenAiAdapter {
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

    fn responses_url(&self) -> String {
        format!("{}/v1/responses", self.base_url)
    }
}

#[derive(Deserialize)]
struct ResponsesApiResult {
    id: String,
    output_text: Option<String>,
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
struct UsageResponse {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError> {
        if request.structured_output_schema.is_some() && !request.tool.capabilities.contains(&broker_types::Capability::StructuredOutput) {
            return Err(AdapterError::UnsupportedStructuredOutput);
        }

        let model = request.tool.model_name.clone();
        let mut body = serde_json::json!({
            "model": model,
            "input": request.rendered_prompt,
        });

        // Resume a prior server-side turn when this session's continuation
        // is actually an OpenAI response id (spec §4.6 family match).
        if let Some(session) = request.session {
            if let broker_types::ContinuationKind::OpenAiResponseId(prev_id) = &session.continuation {
                body["previous_response_id"] = serde_json::json!(prev_id);
            }
        }
        if let Some(schema) = &request.structured_output_schema {
            body["text"] = serde_json::json!({"format": {"type": "json_schema", "schema": schema}});
        }
        for (key, value) in &request.adapter_kwargs {
            body[key] = value.clone();
        }

        let result = with_backoff(self.backoff, &cancel_signal, || {
            let body = body.clone();
            async {
                tokio::select! {
                    result = self
                        .client
                        .post(self.responses_url())
                        .bearer_auth(&self.api_key)
                        .json(&body)
                        .send() => send_and_map(result).await,
                    _ = cancel_signal.cancelled() => Err(AdapterError::Cancelled),
                }
            }
        })
        .await?;

        let text = result.output_text.clone().unwrap_or_default();
        let structured = if let Some(schema) = &request.structured_output_schema {
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| AdapterError::SchemaValidation(format!("model output is not JSON: {e}")))?;
            validate_against_schema(&value, schema)?;
            Some(value)
        } else {
            None
        };

        Ok(AdapterResponse {
            text,
            continuation_token: Some(result.id),
            structured,
            usage: result.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }

    fn provider_family(&self) -> &'static str {
        "openai"
    }
}

/// Validates a model's JSON output against the tool's declared structured-
/// output schema using a standard JSON Schema validator (spec §4.3:
/// "Validation of structured-output schemas uses a standard JSON Schema
/// validator"), checking required properties, enums, and nested shapes,
/// not just the top-level type.
fn validate_against_schema(value: &serde_json::Value, schema: &serde_json::Value) -> Result<(), AdapterError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| AdapterError::SchemaValidation(format!("invalid JSON schema: {e}")))?;
    if let Err(err) = validator.validate(value) {
        return Err(AdapterError::SchemaValidation(err.to_string()));
    }
    Ok(())
}

async fn send_and_map(result: Result<reqwest::Response, reqwest::Error>) -> Result<ResponsesApiResult, AdapterError> {
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
        .json::<ResponsesApiResult>()
        .await
        .map_err(|e| AdapterError::Internal(format!("malformed OpenAI response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_types::{Capability, ContinuationKind, SessionRecord, ToolDescriptor};
    use std::collections::HashSet;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(caps: HashSet<Capability>) -> ToolDescriptor {
        ToolDescriptor {
            name: "chat_with_openai_model".into(),
            description: "desc".into(),
            input_schema: serde_json::json!({"type": "object"}),
            capabilities: caps,
            params: vec![],
            provider_family: "openai".into(),
            model_name: "gpt-5".into(),
            context_window: 128_000,
            default_timeout_ms: 60_000,
        }
    }

    #[tokio::test]
    async fn call_returns_text_and_continuation_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_abc",
                "output_text": "the word is ELEPHANT",
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new("key").base_url(server.uri());
        let descriptor = descriptor(HashSet::new());
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "remember the word".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };

        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "the word is ELEPHANT");
        assert_eq!(response.continuation_token, Some("resp_abc".to_string()));
    }

    #[tokio::test]
    async fn session_continuation_is_forwarded_when_family_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_2",
                "output_text": "ELEPHANT",
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new("key").base_url(server.uri());
        let descriptor = descriptor(HashSet::new());
        let mut session = SessionRecord::new(broker_types::SessionId::new("s2"), "openai", 0, 3600);
        session.continuation = ContinuationKind::OpenAiResponseId("resp_1".into());

        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "what was the word?".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: Some(&session),
        };

        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "ELEPHANT");
    }

    #[tokio::test]
    async fn structured_output_without_capability_is_unsupported() {
        let adapter = OpenAiAdapter::new("key");
        let descriptor = descriptor(HashSet::new());
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "x".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: Some(serde_json::json!({"type": "object"})),
            session: None,
        };
        let err = adapter.call(request, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedStructuredOutput));
    }

    #[test]
    fn schema_validation_checks_top_level_type() {
        let schema = serde_json::json!({"type": "object"});
        assert!(validate_against_schema(&serde_json::json!({"a": 1}), &schema).is_ok());
        assert!(validate_against_schema(&serde_json::json!([1, 2]), &schema).is_err());
    }

    #[test]
    fn schema_validation_checks_required_properties() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"answer": {"type": "string"}},
            "required": ["answer"],
        });
        assert!(validate_against_schema(&serde_json::json!({"answer": "yes"}), &schema).is_ok());
        assert!(validate_against_schema(&serde_json::json!({"other": "yes"}), &schema).is_err());
    }

    #[test]
    fn schema_validation_checks_enum_and_nested_shape() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["ok", "error"]},
                "detail": {"type": "object", "properties": {"code": {"type": "number"}}},
            },
            "required": ["status"],
        });
        assert!(validate_against_schema(
            &serde_json::json!({"status": "ok", "detail": {"code": 1}}),
            &schema
        )
        .is_ok());
        assert!(validate_against_schema(&serde_json::json!({"status": "maybe"}), &schema).is_err());
        assert!(validate_against_schema(
            &serde_json::json!({"status": "ok", "detail": {"code": "not a number"}}),
            &schema
        )
        .is_err());
    }
}
