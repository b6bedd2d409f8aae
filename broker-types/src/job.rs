//! Async job record and state machine (spec §3, §4.8).

use crate::duration::EpochSeconds;
use crate::id::{JobId, ToolName};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job. Transitions are one-directional; see
/// [`JobStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not yet claimed by the worker.
    Pending,
    /// Claimed by the worker and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl JobStatus {
    /// Whether this is one of the absorbing terminal states (spec P8).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `next` is legal per the state
    /// machine in spec §4.8:
    /// `pending -> {running, cancelled}`, `running -> {completed, failed,
    /// cancelled}`, and no transition back to an earlier state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            _ => false,
        }
    }
}

/// Persistent record for one queued asynchronous job (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub job_id: JobId,
    /// The tool this job invokes.
    pub tool_id: ToolName,
    /// The tool's input arguments.
    pub payload: serde_json::Value,
    /// Current status.
    pub status: JobStatus,
    /// Result, once completed.
    pub result: Option<serde_json::Value>,
    /// Fractional progress in `[0.0, 1.0]`, if the tool reports it.
    pub progress: Option<f64>,
    /// Human-readable progress message.
    pub progress_msg: Option<String>,
    /// Error text, once failed.
    pub error_text: Option<String>,
    /// Number of execution attempts so far.
    pub attempt_count: u32,
    /// Maximum attempts before giving up.
    pub max_attempts: u32,
    /// Maximum wall-clock runtime, in seconds, before the job's cancel
    /// signal is raised.
    pub max_runtime_s: u32,
    /// When the job started executing (claimed), if it has.
    pub started_at: Option<EpochSeconds>,
    /// Last time this record was updated.
    pub updated_at: EpochSeconds,
    /// When this record becomes eligible for cleanup.
    pub expires_at: EpochSeconds,
}

impl JobRecord {
    /// A fresh pending record.
    pub fn new(
        job_id: JobId,
        tool_id: ToolName,
        payload: serde_json::Value,
        max_runtime_s: u32,
        now: EpochSeconds,
        ttl_secs: i64,
    ) -> Self {
        Self {
            job_id,
            tool_id,
            payload,
            status: JobStatus::Pending,
            result: None,
            progress: None,
            progress_msg: None,
            error_text: None,
            attempt_count: 0,
            max_attempts: 1,
            max_runtime_s,
            started_at: None,
            updated_at: now,
            expires_at: now + ttl_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            for next in [
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn no_transition_back_to_pending() {
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
    }
}
