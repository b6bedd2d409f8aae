//! Local CLI agents and local-service adapters (spec §4.7, supplement).
//!
//! Two distinct shapes share this module:
//!
//! - [`LocalCliAdapter`] shells out to a subprocess agent (Codex/Claude-Code
//!   style) via `tokio::process::Command`, feeding the rendered prompt on
//!   stdin and reading a final answer from stdout. It reports
//!   `"local-cli"` as its provider family and surfaces the subprocess's own
//!   session/thread id as a [`broker_types::ContinuationKind::CodexThreadId`]
//!   when the subprocess prints one on a recognizable trailer line.
//! - [`TokenCounterAdapter`] is a local-service adapter (spec §4.7: "bypass
//!   the network and return immediately") used by tools that only need to
//!   estimate token usage rather than call an upstream model; it never
//!   touches the network or a subprocess.
//!
//! Grounded on the teacher's `neuron-orch-local` scheduling model (long
//! blocking subprocess exec belongs on a bounded worker pool, never the
//! async reactor thread) via `tokio::process::Command` + `spawn_blocking`
//! for the stdin/stdout plumbing.

use crate::adapter::{Adapter, AdapterRequest, AdapterResponse};
use crate::error::AdapterError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Shells out to a local subprocess agent for one call.
pub struct LocalCliAdapter {
    /// Executable to run (e.g. `"codex"`).
    program: String,
    /// Fixed arguments prepended before the prompt argument.
    args: Vec<String>,
    /// Hard wall-clock ceiling if the process never exits on its own.
    kill_after: Duration,
}

impl LocalCliAdapter {
    /// Build an adapter that runs `program args... <prompt on stdin>`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            kill_after: Duration::from_secs(600),
        }
    }

    /// Override the hard kill ceiling (default 10 minutes).
    pub fn kill_after(mut self, duration: Duration) -> Self {
        self.kill_after = duration;
        self
    }
}

#[async_trait]
impl Adapter for LocalCliAdapter {
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::Internal(format!("failed to spawn `{}`: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdapterError::Internal("subprocess stdin unavailable".into()))?;
        let prompt = request.rendered_prompt.clone();
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| AdapterError::Internal(format!("failed writing subprocess stdin: {e}")))?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::Internal("subprocess stdout unavailable".into()))?;

        let wait = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut output = String::new();
            let mut continuation = None;
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(thread_id) = line.strip_prefix("THREAD_ID:") {
                    continuation = Some(thread_id.trim().to_string());
                    continue;
                }
                output.push_str(&line);
                output.push('\n');
            }
            let status = child
                .wait()
                .await
                .map_err(|e| AdapterError::Internal(format!("failed waiting on subprocess: {e}")))?;
            if !status.success() {
                return Err(AdapterError::FatalClient {
                    status: status.code().unwrap_or(-1) as u16,
                    message: format!("`{}` exited with {status}", self.program),
                });
            }
            Ok((output.trim_end().to_string(), continuation))
        };

        let (text, continuation_token) = tokio::select! {
            result = tokio::time::timeout(self.kill_after, wait) => {
                result.map_err(|_| AdapterError::Timeout)??
            }
            _ = cancel_signal.cancelled() => return Err(AdapterError::Cancelled),
        };

        Ok(AdapterResponse {
            text,
            continuation_token,
            structured: None,
            usage: None,
        })
    }

    fn provider_family(&self) -> &'static str {
        "local-cli"
    }
}

/// A local-service adapter that estimates token counts without ever
/// leaving the process (spec §4.7 supplement).
///
/// Reuses the same [`crate::adapter::Adapter`] interface rather than a
/// bespoke one so the dispatcher needs no special case for it — it just
/// happens to resolve instantly and never return a `continuation_token`.
pub struct TokenCounterAdapter {
    chars_per_token: f64,
}

impl TokenCounterAdapter {
    /// Build a counter using the broker-wide default ratio (spec §4.2's
    /// `CharRatioTokenizer`, 4 characters per token).
    pub fn new() -> Self {
        Self { chars_per_token: 4.0 }
    }
}

impl Default for TokenCounterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for TokenCounterAdapter {
    async fn call(
        &self,
        request: AdapterRequest<'_>,
        _cancel_signal: CancellationToken,
    ) -> Result<AdapterResponse, AdapterError> {
        let estimate = (request.rendered_prompt.chars().count() as f64 / self.chars_per_token).ceil() as u64;
        Ok(AdapterResponse {
            text: estimate.to_string(),
            continuation_token: None,
            structured: Some(serde_json::json!({"estimated_tokens": estimate})),
            usage: None,
        })
    }

    fn provider_family(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_types::ToolDescriptor;
    use std::collections::HashSet;

    fn descriptor(family: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: "local_tool".into(),
            description: "desc".into(),
            input_schema: serde_json::json!({"type": "object"}),
            capabilities: HashSet::new(),
            params: vec![],
            provider_family: family.into(),
            model_name: String::new(),
            context_window: 0,
            default_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn token_counter_estimates_from_char_count() {
        let adapter = TokenCounterAdapter::new();
        let descriptor = descriptor("local");
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "a".repeat(40),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };
        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "10");
        assert_eq!(response.continuation_token, None);
    }

    #[tokio::test]
    async fn local_cli_runs_echo_and_captures_stdout() {
        let adapter = LocalCliAdapter::new("cat", vec![]);
        let descriptor = descriptor("local-cli");
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "hello from the harness".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };
        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "hello from the harness");
    }

    #[tokio::test]
    async fn local_cli_reads_thread_id_trailer() {
        let adapter = LocalCliAdapter::new(
            "sh",
            vec!["-c".into(), "echo body line; echo THREAD_ID: abc123".into()],
        );
        let descriptor = descriptor("local-cli");
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "ignored".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };
        let response = adapter.call(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.text, "body line");
        assert_eq!(response.continuation_token, Some("abc123".to_string()));
    }

    #[tokio::test]
    async fn local_cli_nonzero_exit_is_fatal_client() {
        let adapter = LocalCliAdapter::new("sh", vec!["-c".into(), "exit 3".into()]);
        let descriptor = descriptor("local-cli");
        let request = AdapterRequest {
            tool: &descriptor,
            rendered_prompt: "x".into(),
            adapter_kwargs: serde_json::Map::new(),
            vector_store_ids: vec![],
            images: vec![],
            structured_output_schema: None,
            session: None,
        };
        let err = adapter.call(request, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AdapterError::FatalClient { status: 3, .. }));
    }
}
