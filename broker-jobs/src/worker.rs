//! Single background worker loop: poll, claim, invoke, record outcome
//! (spec §4.8 "Worker loop").
//!
//! Generalized from the teacher's `neuron-orch-local::LocalOrch`
//! concurrent-task-dispatch pattern, specialized to a single polling loop
//! per spec §4.8 ("a single background task polls for pending jobs").

use crate::error::JobError;
use crate::queue::JobQueue;
use async_trait::async_trait;
use broker_tool::ToolRegistry;
use broker_types::{now_epoch, JobId, ToolName};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Invokes a job's target tool synchronously inside the worker, honoring
/// a deadline-bound cancel signal (spec §4.8: "invokes the target tool's
/// handler synchronously (inside the worker)").
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run `tool_id` with `payload`, returning its JSON result or an error
    /// message. `cancel_signal` fires when the job's `max_runtime_s`
    /// deadline elapses.
    async fn run(
        &self,
        tool_id: &ToolName,
        payload: serde_json::Value,
        cancel_signal: CancellationToken,
    ) -> Result<serde_json::Value, String>;
}

/// [`JobHandler`] that dispatches to the live [`ToolRegistry`], the same
/// registry the dispatcher uses for synchronous `tools/call` requests —
/// a job is just a tool call whose result is polled instead of returned
/// inline.
pub struct RegistryJobHandler {
    registry: Arc<ToolRegistry>,
}

impl RegistryJobHandler {
    /// Wrap a registry for job dispatch.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobHandler for RegistryJobHandler {
    async fn run(
        &self,
        tool_id: &ToolName,
        payload: serde_json::Value,
        cancel_signal: CancellationToken,
    ) -> Result<serde_json::Value, String> {
        let tool = self
            .registry
            .get(tool_id.as_str())
            .ok_or_else(|| format!("job target tool not found: {tool_id}"))?;
        tool.call(payload, cancel_signal).await.map_err(|e| e.to_string())
    }
}

/// Polls a [`JobQueue`] for pending work and executes it one job at a
/// time.
pub struct Worker<Q, H> {
    queue: Arc<Q>,
    handler: Arc<H>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl<Q, H> Worker<Q, H>
where
    Q: JobQueue + 'static,
    H: JobHandler + 'static,
{
    /// Build a worker over `queue`, dispatching claimed jobs to `handler`.
    pub fn new(queue: Arc<Q>, handler: Arc<H>, poll_interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            queue,
            handler,
            poll_interval,
            shutdown,
        }
    }

    /// Run the polling loop until `shutdown` fires (spec §4.8: "a short
    /// sleep when none are available").
    pub async fn run(&self) {
        info!("job worker started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.queue.claim_next_pending(now_epoch()).await {
                Ok(Some(job)) => {
                    self.execute(job).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to poll job queue");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        info!("job worker stopped");
    }

    async fn execute(&self, job: broker_types::JobRecord) {
        let job_cancel = CancellationToken::new();
        let deadline = Duration::from_secs(job.max_runtime_s as u64);
        let timer_cancel = job_cancel.clone();
        let timeout_task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => timer_cancel.cancel(),
                _ = timer_cancel.cancelled() => {}
            }
        });

        let outcome = self.handler.run(&job.tool_id, job.payload.clone(), job_cancel.clone()).await;
        job_cancel.cancel();
        timeout_task.abort();

        let now = now_epoch();
        let result = match outcome {
            Ok(value) => self.queue.complete(&job.job_id, value, now).await,
            Err(message) => self.queue.fail(&job.job_id, message, now).await,
        };
        if let Err(e) = result {
            warn!(job_id = %job.job_id, error = %e, "failed to record job outcome");
        }
    }

    /// Request cancellation of a specific queued job before it is claimed,
    /// or mark it cancelled if already claimed; the running handler must
    /// observe its own `cancel_signal` to actually stop work in the latter
    /// case — this only flips the persisted status.
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), JobError> {
        self.queue.cancel(job_id, now_epoch()).await
    }
}
