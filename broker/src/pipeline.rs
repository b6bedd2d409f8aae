//! Per-call orchestration: split args, assemble context, acquire a
//! vector-store lease if needed, dispatch to an adapter, then persist the
//! session record and fire off a memory write — all under one per-session
//! lock (spec §5).
//!
//! The session lock follows the exact pattern
//! `broker_vectorstore::VectorStoreManager` uses internally for its own
//! per-session serialization (a `Mutex<HashMap<SessionId, Arc<Mutex<()>>>>`
//! lazily populated per key); `broker-session` has no lock of its own; spec
//! §5 requires one held across "lookup → adapter call → upsert", so this
//! crate builds it at the pipeline layer instead.

use crate::vectorstore_backend::OpenAiVectorStoreBackend;
use broker_adapter::{Adapter, AdapterError, AdapterRequest};
use broker_context::assemble;
use broker_memory::MemoryStore;
use broker_session::SessionStore;
use broker_tool::{split_args, ToolError};
use broker_types::{
    now_epoch, CompactedTurn, ContinuationKind, McpRequestId, SessionId, SessionRecord,
    ToolCallContext, ToolDescriptor, VectorStoreId,
};
use broker_vectorstore::{VectorStoreManager, VectorStoreRepository};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Concrete vector-store manager instantiation this broker ships: the
/// OpenAI-backed provider-side index plus the SQLite-backed lease
/// repository (`broker-db::SqliteVectorStoreRepository`, wired in
/// [`crate::lifecycle`]).
pub type AppVectorStoreManager<R> = VectorStoreManager<OpenAiVectorStoreBackend, R>;

/// Shared state every chat-style tool dispatches through.
pub struct Pipeline<R: VectorStoreRepository> {
    vector_store: Option<Arc<AppVectorStoreManager<R>>>,
    sessions: Arc<dyn SessionStore>,
    memory: Arc<MemoryStore>,
    metrics: Arc<crate::metrics::Metrics>,
    session_locks: AsyncMutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
    inline_budget_tokens: u64,
    session_ttl_secs: i64,
    respect_ignore_files: bool,
}

/// Result of running one chat-style call through the pipeline.
pub struct ChatOutcome {
    /// JSON payload to return as the tool result.
    pub result: Value,
}

impl<R: VectorStoreRepository> Pipeline<R> {
    /// Wire a pipeline over the shared subsystem handles.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vector_store: Option<Arc<AppVectorStoreManager<R>>>,
        sessions: Arc<dyn SessionStore>,
        memory: Arc<MemoryStore>,
        metrics: Arc<crate::metrics::Metrics>,
        inline_budget_tokens: u64,
        session_ttl_secs: i64,
        respect_ignore_files: bool,
    ) -> Self {
        Self {
            vector_store,
            sessions,
            memory,
            metrics,
            session_locks: AsyncMutex::new(HashMap::new()),
            inline_budget_tokens,
            session_ttl_secs,
            respect_ignore_files,
        }
    }

    async fn lock_for_session(&self, session_id: &SessionId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(session_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Run a chat-style tool call end to end.
    pub async fn run_chat(
        &self,
        descriptor: &ToolDescriptor,
        adapter: &dyn Adapter,
        request_id: McpRequestId,
        raw_args: Value,
        cancel_signal: CancellationToken,
    ) -> Result<Value, ToolError> {
        let split = split_args(descriptor, &raw_args)?;
        let mut ctx = ToolCallContext::new(request_id, descriptor.name.clone(), raw_args, cancel_signal.clone());
        ctx.split_args = split;

        let session_id = ctx
            .split_args
            .session
            .iter()
            .find(|(k, _)| k == "session_id")
            .and_then(|(_, v)| v.as_str())
            .map(SessionId::new);
        ctx.session_id = session_id.clone();

        // The per-session lock is held from here through the upsert below,
        // per spec §5. A call with no session id needs no serialization.
        let guard_lock = match &session_id {
            Some(id) => Some(self.lock_for_session(id).await),
            None => None,
        };
        let _guard = match &guard_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let prior_session = match &session_id {
            Some(id) => self
                .sessions
                .get(id)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?,
            None => None,
        };
        let previous_stable = prior_session
            .as_ref()
            .map(|s| s.inline_file_fingerprints.clone())
            .unwrap_or_default();

        let context_paths = extract_paths(&ctx.split_args.adapter, "context_paths");
        let attachment_paths = extract_paths_from_pairs(&ctx.split_args.vector_store, "attachment_paths");
        let priority_paths = extract_paths(&ctx.split_args.adapter, "priority_paths");
        let requested_vector_store_ids = extract_strings_from_pairs(&ctx.split_args.vector_store, "vector_store_ids");

        let assembled = assemble(
            &context_paths,
            &attachment_paths,
            &priority_paths,
            &previous_stable,
            self.inline_budget_tokens,
            self.respect_ignore_files,
        )
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        for warning in &assembled.warnings {
            warn!(path = %warning.path, reason = %warning.message, "context assembly warning");
        }

        ctx.inline_files = assembled.inline.clone();
        ctx.overflow_files = assembled.overflow.clone();

        let mut vs_id: Option<VectorStoreId> = None;
        if !assembled.overflow.is_empty() {
            if let (Some(id), Some(manager)) = (&session_id, &self.vector_store) {
                let outcome = manager
                    .acquire(id, &assembled.overflow, now_epoch())
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                self.metrics.record_vector_store_upload();
                ctx.vector_store_ids.push(outcome.vs_id.as_str().to_string());
                vs_id = Some(outcome.vs_id);
            }
        }

        // A caller-supplied `vector_store_ids` (spec §4.3's `vector_store`
        // route) asks to reuse an already-built store in addition to
        // whatever this call's own overflow set acquires; both flow to the
        // adapter so it can search across all of them.
        for id in requested_vector_store_ids {
            if !ctx.vector_store_ids.contains(&id) {
                ctx.vector_store_ids.push(id);
            }
        }

        if cancel_signal.is_cancelled() {
            self.metrics.record_cancellation();
            return Err(ToolError::Cancelled);
        }

        let rendered_prompt = render_prompt(&ctx, &assembled.tree);

        let request = AdapterRequest {
            tool: descriptor,
            rendered_prompt: rendered_prompt.clone(),
            adapter_kwargs: ctx.split_args.adapter.clone(),
            vector_store_ids: ctx.vector_store_ids.iter().map(|s| VectorStoreId::new(s.clone())).collect(),
            images: Vec::new(),
            structured_output_schema: ctx.split_args.adapter.get("structured_output_schema").cloned(),
            session: prior_session.as_ref(),
        };

        let response = adapter.call(request, cancel_signal.clone()).await;
        let response = match response {
            Ok(r) => r,
            Err(AdapterError::Cancelled) => {
                self.metrics.record_cancellation();
                return Err(ToolError::Cancelled);
            }
            Err(e) => {
                self.metrics.record_tool_call(true);
                return Err(ToolError::ExecutionFailed(e.to_string()));
            }
        };

        if cancel_signal.is_cancelled() {
            // Matches spec §5's cancellation contract for the session lock:
            // release without applying the intended update, leaving the
            // session's prior state authoritative.
            self.metrics.record_cancellation();
            return Err(ToolError::Cancelled);
        }

        if let Some(id) = &session_id {
            let mut record = prior_session.unwrap_or_else(|| {
                SessionRecord::new(id.clone(), adapter.provider_family().to_string(), now_epoch(), self.session_ttl_secs)
            });
            record.continuation = continuation_for(adapter.provider_family(), response.continuation_token.clone());
            record.compacted_history.push(CompactedTurn {
                role: "user".to_string(),
                text: rendered_prompt.clone(),
            });
            record.compacted_history.push(CompactedTurn {
                role: "assistant".to_string(),
                text: response.text.clone(),
            });
            record.inline_file_fingerprints = assembled.new_stable_hashes.clone();
            if let Some(vs_id) = &vs_id {
                record.vector_store_id = Some(vs_id.as_str().to_string());
            }
            record.last_seen_epoch = now_epoch();
            record.ttl_epoch = now_epoch() + self.session_ttl_secs;
            self.sessions
                .upsert(&record)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        }
        drop(_guard);

        self.metrics.record_tool_call(false);
        self.metrics.record_memory_write();
        self.memory.store_in_background(
            session_id,
            descriptor.name.clone(),
            vec![CompactedTurn {
                role: "user".to_string(),
                text: rendered_prompt,
            }],
            response.text.clone(),
        );

        Ok(serde_json::json!({
            "text": response.text,
            "structured": response.structured,
            "usage": response.usage.map(|u| serde_json::json!({
                "prompt_tokens": u.prompt_tokens,
                "completion_tokens": u.completion_tokens,
            })),
            "context_tree": assembled.tree,
        }))
    }
}

fn extract_paths(adapter_args: &serde_json::Map<String, Value>, key: &str) -> Vec<PathBuf> {
    adapter_args
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(PathBuf::from).collect())
        .unwrap_or_default()
}

/// Same as [`extract_paths`] but for the `vector_store`-routed bucket,
/// which is a `Vec<(name, value)>` rather than a map (spec §4.3).
fn extract_paths_from_pairs(pairs: &[(String, Value)], key: &str) -> Vec<PathBuf> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.as_array())
        .map(|arr| arr.iter().filter_map(Value::as_str).map(PathBuf::from).collect())
        .unwrap_or_default()
}

fn extract_strings_from_pairs(pairs: &[(String, Value)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.as_array())
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn render_prompt(ctx: &ToolCallContext, tree: &str) -> String {
    let mut prompt = String::new();
    for (_, value) in &ctx.split_args.prompt {
        if let Some(text) = value.as_str() {
            prompt.push_str(text);
            prompt.push('\n');
        }
    }
    if !tree.is_empty() {
        prompt.push_str("\n--- project tree ---\n");
        prompt.push_str(tree);
    }
    for file in &ctx.inline_files {
        let Ok(content) = std::fs::read_to_string(&file.abs_path) else {
            continue;
        };
        prompt.push_str(&format!("\n--- {} ---\n{content}\n", file.abs_path.display()));
    }
    prompt
}

fn continuation_for(provider_family: &str, token: Option<String>) -> ContinuationKind {
    match (provider_family, token) {
        ("openai", Some(id)) => ContinuationKind::OpenAiResponseId(id),
        ("anthropic", _) => ContinuationKind::AnthropicHistoryOnly,
        ("codex", Some(id)) => ContinuationKind::CodexThreadId(id),
        ("gemini", Some(id)) => ContinuationKind::GeminiSessionHandle(id),
        (_, Some(token)) => ContinuationKind::Opaque(token),
        (_, None) => ContinuationKind::Opaque(String::new()),
    }
}
