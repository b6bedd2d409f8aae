//! Session continuity record (spec §3, §4.6).

use crate::duration::EpochSeconds;
use crate::id::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which continuation-token dialect a session's `continuation_token`
/// belongs to.
///
/// Design Note (spec §9) leaves this mapping implicit ("Codex-style agents
/// use `thread_id` while others use `session_id`"); we make it explicit so
/// family-mismatch detection (spec §4.6) is a match on a concrete variant,
/// not a sniffed string shape.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContinuationKind {
    /// OpenAI Responses API `response_id`.
    OpenAiResponseId(String),
    /// Anthropic Messages API, no native continuation — compacted history
    /// carries the conversation instead.
    AnthropicHistoryOnly,
    /// A Codex-style local CLI agent's `thread_id`.
    CodexThreadId(String),
    /// Gemini-family response/session handle.
    GeminiSessionHandle(String),
    /// Anything else, carried opaquely.
    Opaque(String),
}

impl ContinuationKind {
    /// The provider family this continuation kind belongs to. Two records
    /// with different families can share compacted history but never a
    /// continuation token (spec §4.6).
    pub fn family(&self) -> &'static str {
        match self {
            Self::OpenAiResponseId(_) => "openai",
            Self::AnthropicHistoryOnly => "anthropic",
            Self::CodexThreadId(_) => "codex",
            Self::GeminiSessionHandle(_) => "gemini",
            Self::Opaque(_) => "unknown",
        }
    }
}

/// One turn of compacted conversation history, shared across provider
/// families for higher-level memory (not per-turn continuation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedTurn {
    /// `"user"` or `"assistant"`.
    pub role: String,
    /// Free-form text of the turn.
    pub text: String,
}

/// Persistent record mapping a `session_id` to provider continuation state
/// (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session identifier this record is keyed by.
    pub session_id: SessionId,
    /// Which upstream family this session's `continuation` belongs to.
    pub provider_family: String,
    /// Opaque continuation state for the family's next-turn request.
    pub continuation: ContinuationKind,
    /// Compacted message history, shared across families.
    pub compacted_history: Vec<CompactedTurn>,
    /// Vector store backing this session's overflow set, if one exists.
    pub vector_store_id: Option<String>,
    /// Content hashes of files currently in the stable inline set (spec
    /// §4.4 step 5, P5).
    pub inline_file_fingerprints: HashSet<String>,
    /// Last time this session was read or written.
    pub last_seen_epoch: EpochSeconds,
    /// When this session record expires and becomes eligible for eviction.
    pub ttl_epoch: EpochSeconds,
}

impl SessionRecord {
    /// A fresh record for a session seen for the first time.
    pub fn new(session_id: SessionId, provider_family: impl Into<String>, now: EpochSeconds, ttl_secs: i64) -> Self {
        Self {
            session_id,
            provider_family: provider_family.into(),
            continuation: ContinuationKind::Opaque(String::new()),
            compacted_history: Vec::new(),
            vector_store_id: None,
            inline_file_fingerprints: HashSet::new(),
            last_seen_epoch: now,
            ttl_epoch: now + ttl_secs,
        }
    }

    /// Whether this record has expired as of `now`.
    pub fn is_expired(&self, now: EpochSeconds) -> bool {
        now > self.ttl_epoch
    }

    /// Whether a call targeting `other_family` can continue this session's
    /// provider-native turn, or must start fresh while keeping history.
    pub fn can_continue_natively(&self, other_family: &str) -> bool {
        self.continuation.family() == other_family
    }
}
