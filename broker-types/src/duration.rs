//! Stable duration and epoch types for the wire format.
//!
//! [`DurationMs`] serializes as a plain integer (milliseconds) rather than
//! serde's default `{"secs": N, "nanos": N}` shape, so the JSON sent to
//! clients and stored in SQLite stays a single, portable number.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds with a stable JSON representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Construct from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Construct from whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// The value in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Unix epoch seconds. Every TTL/expiry field in the data model (§3) is one
/// of these rather than a `chrono::DateTime`, so comparisons are cheap
/// integer comparisons and the SQLite schema stores a plain `INTEGER`.
pub type EpochSeconds = i64;

/// The current time as epoch seconds.
pub fn now_epoch() -> EpochSeconds {
    chrono::Utc::now().timestamp()
}
