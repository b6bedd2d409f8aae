//! Memory entry record (spec §3, §4.9).

use crate::duration::EpochSeconds;
use crate::id::{MemoryId, SessionId};
use serde::{Deserialize, Serialize};

/// A write-once summary of one tool exchange, stored for later similarity
/// search (spec §3, §4.9). Retrieval is delegated to the provider; the
/// broker never re-ranks or re-embeds locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Entry identifier.
    pub memory_id: MemoryId,
    /// Session this exchange belongs to, if any.
    pub session_id: Option<SessionId>,
    /// Name of the tool that produced this exchange.
    pub tool_name: String,
    /// Compact summary text.
    pub summary_text: String,
    /// Provider-assigned handle for the stored embedding/vector entry.
    pub embedding_handle: String,
    /// When this entry was created.
    pub created_epoch: EpochSeconds,
}
