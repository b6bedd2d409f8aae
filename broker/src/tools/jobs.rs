//! `start_job` / `poll_job` / `cancel_job`: the async job-queue surface
//! (spec §4.8, §8 scenario "job lifecycle").

use broker_jobs::SqliteJobQueue;
use broker_jobs::JobQueue;
use broker_tool::{ToolDyn, ToolError, ToolRegistry};
use broker_types::{now_epoch, JobId, JobRecord, ParamRoute, ParamSpec, ToolDescriptor, ToolName};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_RUNTIME_S: u32 = 300;

/// Enqueues a job targeting any tool already present in the live registry
/// (spec §4.8: "a job is just a tool call whose result is polled instead
/// of returned inline").
pub struct StartJobTool {
    descriptor: ToolDescriptor,
    queue: Arc<SqliteJobQueue>,
    registry: Arc<ToolRegistry>,
    job_ttl_secs: i64,
}

impl StartJobTool {
    /// Build the tool over the shared queue and registry.
    pub fn new(queue: Arc<SqliteJobQueue>, registry: Arc<ToolRegistry>, job_ttl_secs: i64) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "start_job".to_string(),
                description: "Enqueue a long-running tool call and return a job id to poll.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "tool_id": {"type": "string"},
                        "payload": {"type": "object"},
                        "max_runtime_s": {"type": "integer"},
                    },
                    "required": ["tool_id", "payload"],
                }),
                capabilities: HashSet::new(),
                params: vec![
                    ParamSpec { name: "tool_id".to_string(), route: ParamRoute::Adapter, required: true },
                    ParamSpec { name: "payload".to_string(), route: ParamRoute::Adapter, required: true },
                    ParamSpec { name: "max_runtime_s".to_string(), route: ParamRoute::Adapter, required: false },
                ],
                provider_family: "local".to_string(),
                model_name: "job-queue".to_string(),
                context_window: 0,
                default_timeout_ms: 5_000,
            },
            queue,
            registry,
            job_ttl_secs,
        }
    }
}

impl ToolDyn for StartJobTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let tool_id = input
                .get("tool_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`tool_id` is required".to_string()))?;
            if self.registry.get(tool_id).is_none() {
                return Err(ToolError::NotFound(tool_id.to_string()));
            }
            let payload = input.get("payload").cloned().unwrap_or(Value::Null);
            let max_runtime_s = input
                .get("max_runtime_s")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .unwrap_or(DEFAULT_MAX_RUNTIME_S);

            let job_id = JobId::new(uuid::Uuid::new_v4().to_string());
            let record = JobRecord::new(job_id.clone(), ToolName::new(tool_id), payload, max_runtime_s, now_epoch(), self.job_ttl_secs);
            self.queue
                .enqueue(record)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            Ok(serde_json::json!({"job_id": job_id.as_str()}))
        })
    }
}

/// Reports a job's current status, progress, and result/error.
pub struct PollJobTool {
    descriptor: ToolDescriptor,
    queue: Arc<SqliteJobQueue>,
}

impl PollJobTool {
    /// Build the tool over the shared queue.
    pub fn new(queue: Arc<SqliteJobQueue>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "poll_job".to_string(),
                description: "Fetch a job's current status, progress, and result or error.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {"job_id": {"type": "string"}},
                    "required": ["job_id"],
                }),
                capabilities: HashSet::new(),
                params: vec![ParamSpec { name: "job_id".to_string(), route: ParamRoute::Adapter, required: true }],
                provider_family: "local".to_string(),
                model_name: "job-queue".to_string(),
                context_window: 0,
                default_timeout_ms: 5_000,
            },
            queue,
        }
    }
}

impl ToolDyn for PollJobTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let job_id = input
                .get("job_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`job_id` is required".to_string()))?;

            let job = self
                .queue
                .get(&JobId::new(job_id))
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
                .ok_or_else(|| ToolError::NotFound(job_id.to_string()))?;

            Ok(serde_json::json!({
                "status": format!("{:?}", job.status).to_lowercase(),
                "progress": job.progress,
                "progress_msg": job.progress_msg,
                "result": job.result,
                "error": job.error_text,
            }))
        })
    }
}

/// Requests cancellation of a queued or running job.
pub struct CancelJobTool {
    descriptor: ToolDescriptor,
    queue: Arc<SqliteJobQueue>,
}

impl CancelJobTool {
    /// Build the tool over the shared queue.
    pub fn new(queue: Arc<SqliteJobQueue>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "cancel_job".to_string(),
                description: "Request cancellation of a queued or running job.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {"job_id": {"type": "string"}},
                    "required": ["job_id"],
                }),
                capabilities: HashSet::new(),
                params: vec![ParamSpec { name: "job_id".to_string(), route: ParamRoute::Adapter, required: true }],
                provider_family: "local".to_string(),
                model_name: "job-queue".to_string(),
                context_window: 0,
                default_timeout_ms: 5_000,
            },
            queue,
        }
    }
}

impl ToolDyn for CancelJobTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        _cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let job_id = input
                .get("job_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidRequest("`job_id` is required".to_string()))?;

            self.queue
                .cancel(&JobId::new(job_id), now_epoch())
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            Ok(serde_json::json!({"job_id": job_id, "status": "cancelled"}))
        })
    }
}
