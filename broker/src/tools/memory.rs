//! `search_project_memory` / `search_session_attachments`: the two
//! retrieval tools over [`MemoryStore`] (spec §4.9).

use broker_memory::MemoryStore;
use broker_tool::{ToolDyn, ToolError};
use broker_types::{ParamRoute, ParamSpec, SessionId, ToolDescriptor};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_RESULTS: usize = 10;

fn hits_to_json(hits: Vec<broker_memory::MemoryHit>) -> Value {
    serde_json::json!(hits
        .into_iter()
        .map(|h| serde_json::json!({
            "summary_text": h.summary_text,
            "score": h.score,
        }))
        .collect::<Vec<_>>())
}

/// Searches across every session's stored exchanges.
pub struct SearchProjectMemoryTool {
    descriptor: ToolDescriptor,
    memory: Arc<MemoryStore>,
}

impl SearchProjectMemoryTool {
    /// Build the tool over the shared memory store.
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "search_project_memory".to_string(),
                description: "Search across every session's stored conversation summaries.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "max_results": {"type": "integer"},
                    },
                    "required": ["query"],
                }),
                capabilities: HashSet::new(),
                params: vec![
                    ParamSpec { name: "query".to_string(), route: ParamRoute::Adapter, required: true },
                    ParamSpec { name: "max_results".to_string(), route: ParamRoute::Adapter, required: false },
                ],
                provider_family: "local".to_string(),
                model_name: "memory-search".to_string(),
                context_window: 0,
                default_timeout_ms: 10_000,
            },
            memory,
        }
    }
}

impl ToolDyn for SearchProjectMemoryTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let query = input
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`query` is required".to_string()))?;
            let max_results = input.get("max_results").and_then(Value::as_u64).unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

            let hits = self
                .memory
                .search_project_memory(query, max_results)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            Ok(hits_to_json(hits))
        })
    }
}

/// Searches restricted to one session's stored exchanges.
pub struct SearchSessionAttachmentsTool {
    descriptor: ToolDescriptor,
    memory: Arc<MemoryStore>,
}

impl SearchSessionAttachmentsTool {
    /// Build the tool over the shared memory store.
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "search_session_attachments".to_string(),
                description: "Search conversation summaries recorded for one session.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": {"type": "string"},
                        "query": {"type": "string"},
                        "max_results": {"type": "integer"},
                    },
                    "required": ["session_id", "query"],
                }),
                capabilities: HashSet::new(),
                params: vec![
                    ParamSpec { name: "session_id".to_string(), route: ParamRoute::Session, required: true },
                    ParamSpec { name: "query".to_string(), route: ParamRoute::Adapter, required: true },
                    ParamSpec { name: "max_results".to_string(), route: ParamRoute::Adapter, required: false },
                ],
                provider_family: "local".to_string(),
                model_name: "memory-search".to_string(),
                context_window: 0,
                default_timeout_ms: 10_000,
            },
            memory,
        }
    }
}

impl ToolDyn for SearchSessionAttachmentsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let session_id = input
                .get("session_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`session_id` is required".to_string()))?;
            let query = input
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`query` is required".to_string()))?;
            let max_results = input.get("max_results").and_then(Value::as_u64).unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

            let hits = self
                .memory
                .search_session_attachments(&SessionId::new(session_id), query, max_results)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            Ok(hits_to_json(hits))
        })
    }
}
