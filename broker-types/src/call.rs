//! The per-invocation tool call context (spec §3).

use crate::file::FileRef;
use crate::id::{McpRequestId, SessionId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A call's arguments, split by route (spec §3, §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitArgs {
    /// Parameters routed to `prompt`, in declared positional order.
    pub prompt: Vec<(String, serde_json::Value)>,
    /// Parameters routed to `adapter` (keyword args for the provider call).
    pub adapter: serde_json::Map<String, serde_json::Value>,
    /// Parameters routed to `vector_store` (attachment paths and similar).
    pub vector_store: Vec<(String, serde_json::Value)>,
    /// Parameters routed to `session`.
    pub session: Vec<(String, serde_json::Value)>,
}

/// Per-invocation state created on call entry and destroyed when the call
/// terminates (spec §3). Mutated only by the context assembler and the
/// vector-store manager.
pub struct ToolCallContext {
    /// The JSON-RPC request id this call was made under.
    pub request_id: McpRequestId,
    /// Name of the tool being invoked.
    pub tool_name: String,
    /// Raw arguments as received in `tools/call`.
    pub raw_args: serde_json::Value,
    /// Arguments split by route.
    pub split_args: SplitArgs,
    /// Session id, if the call declared one.
    pub session_id: Option<SessionId>,
    /// Files selected for inline inclusion in the prompt.
    pub inline_files: Vec<FileRef>,
    /// Files routed to the overflow (vector-store) set.
    pub overflow_files: Vec<FileRef>,
    /// Vector store ids backing the overflow set for this call.
    pub vector_store_ids: Vec<String>,
    /// Cancellation signal threaded through every downstream operation.
    pub cancel_signal: CancellationToken,
}

impl ToolCallContext {
    /// Create a fresh context for a call that just entered the dispatcher.
    pub fn new(
        request_id: McpRequestId,
        tool_name: impl Into<String>,
        raw_args: serde_json::Value,
        cancel_signal: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            tool_name: tool_name.into(),
            raw_args,
            split_args: SplitArgs::default(),
            session_id: None,
            inline_files: Vec::new(),
            overflow_files: Vec::new(),
            vector_store_ids: Vec::new(),
            cancel_signal,
        }
    }

    /// Whether this call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_signal.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_cancelled() {
        let ctx = ToolCallContext::new(
            McpRequestId::new("1"),
            "chat_with_x",
            serde_json::json!({}),
            CancellationToken::new(),
        );
        assert!(!ctx.is_cancelled());
        assert!(ctx.inline_files.is_empty());
        assert!(ctx.overflow_files.is_empty());
    }

    #[test]
    fn cancel_signal_propagates() {
        let token = CancellationToken::new();
        let ctx = ToolCallContext::new(
            McpRequestId::new("1"),
            "chat_with_x",
            serde_json::json!({}),
            token.clone(),
        );
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
