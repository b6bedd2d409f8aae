//! Per-component counters exposed through a `tools/call`-able diagnostics
//! tool (spec §9: "a single structured-log sink plus a metrics counter per
//! component"; a full metrics exporter is out of scope per spec §1).

use broker_tool::{ToolDyn, ToolError};
use broker_types::{Capability, ToolDescriptor};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Process-wide counters, one `AtomicU64` per tracked event.
#[derive(Default)]
pub struct Metrics {
    tool_calls_total: AtomicU64,
    tool_errors_total: AtomicU64,
    tool_cancellations_total: AtomicU64,
    jobs_enqueued_total: AtomicU64,
    vector_store_uploads_total: AtomicU64,
    memory_writes_total: AtomicU64,
}

impl Metrics {
    /// Build an all-zero counter set.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one completed tool call, successful or not.
    pub fn record_tool_call(&self, failed: bool) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.tool_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a tool call that ended via cancellation.
    pub fn record_cancellation(&self) {
        self.tool_cancellations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job enqueued through `start_job`.
    pub fn record_job_enqueued(&self) {
        self.jobs_enqueued_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file uploaded to a provider vector store.
    pub fn record_vector_store_upload(&self) {
        self.vector_store_uploads_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fire-and-forget memory write attempt.
    pub fn record_memory_write(&self) {
        self.memory_writes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter as a JSON object.
    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "tool_calls_total": self.tool_calls_total.load(Ordering::Relaxed),
            "tool_errors_total": self.tool_errors_total.load(Ordering::Relaxed),
            "tool_cancellations_total": self.tool_cancellations_total.load(Ordering::Relaxed),
            "jobs_enqueued_total": self.jobs_enqueued_total.load(Ordering::Relaxed),
            "vector_store_uploads_total": self.vector_store_uploads_total.load(Ordering::Relaxed),
            "memory_writes_total": self.memory_writes_total.load(Ordering::Relaxed),
        })
    }
}

/// `broker_diagnostics`: reports the counters above. Takes no parameters.
pub struct DiagnosticsTool {
    descriptor: ToolDescriptor,
    metrics: Arc<Metrics>,
}

impl DiagnosticsTool {
    /// Build the tool over a shared counter set.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "broker_diagnostics".to_string(),
                description: "Report process-wide counters for tool calls, jobs, vector-store uploads, and memory writes.".to_string(),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
                capabilities: HashSet::new(),
                params: Vec::new(),
                provider_family: "local".to_string(),
                model_name: "broker-diagnostics".to_string(),
                context_window: 0,
                default_timeout_ms: 1_000,
            },
            metrics,
        }
    }
}

impl ToolDyn for DiagnosticsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        _input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move { Ok(self.metrics.snapshot()) })
    }
}
