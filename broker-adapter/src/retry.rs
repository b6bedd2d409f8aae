//! Bounded exponential backoff for transient/rate-limited adapter errors
//! (spec §4.7: "retry with exponential backoff up to a configured attempt
//! ceiling").
//!
//! Grounded on the teacher's `ProviderError::is_retryable`-gated retry
//! convention (`agent-provider-anthropic`, `agent-provider-ollama`), here
//! expressed as a free function any adapter's `call` can wrap its upstream
//! request with, rather than baked into the [`crate::adapter::Adapter`]
//! trait — local-service adapters that never talk to a network have no
//! use for it.

use crate::error::AdapterError;
use broker_types::Classify;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Backoff policy: exponential with a cap, following `base * 2^attempt`
/// clamped to `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1 << attempt.min(16));
        scaled.min(self.max_delay)
    }
}

/// Run `op` under `policy`, retrying while the returned error classifies
/// as retryable (spec §7: transient network, rate-limited, upstream
/// timeout) and the attempt budget remains. Fatal-client errors are
/// returned immediately on the first attempt (spec §4.7: "On fatal-client
/// errors... do not retry"). Honors `cancel_signal` between attempts.
pub async fn with_backoff<T, F, Fut>(
    policy: BackoffPolicy,
    cancel_signal: &CancellationToken,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 0;
    loop {
        if cancel_signal.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind().is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, error = %err, "retrying adapter call after transient error");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel_signal.cancelled() => return Err(AdapterError::Cancelled),
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(BackoffPolicy::default(), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AdapterError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let result = with_backoff(policy, &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::TransientNetwork("flaky".into()))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_backoff(BackoffPolicy::default(), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::FatalClient { status: 400, message: "bad".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempt_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let result: Result<(), AdapterError> = with_backoff(policy, &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::RateLimited("slow".into())) }
        })
        .await;
        assert!(matches!(result, Err(AdapterError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), AdapterError> =
            with_backoff(BackoffPolicy::default(), &token, || async { Ok(()) }).await;
        assert!(matches!(result, Err(AdapterError::Cancelled)));
    }
}
