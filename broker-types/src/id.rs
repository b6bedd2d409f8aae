//! Typed identifier wrappers.
//!
//! Thin `String` newtypes so a `SessionId` can never be passed where a
//! `JobId` is expected. No format is enforced — the broker does not care
//! whether a client's `session_id` is a UUID, a slug, or a sentence.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(SessionId, "Client-chosen identifier grouping related tool calls.");
typed_id!(JobId, "Identifier for a queued asynchronous job (a UUID in practice).");
typed_id!(VectorStoreId, "Provider-assigned identifier for an uploaded vector index.");
typed_id!(McpRequestId, "JSON-RPC request id, stringified (JSON-RPC ids may be numbers or strings).");
typed_id!(MemoryId, "Identifier for a stored memory entry.");
typed_id!(ToolName, "Unique name of a registered tool.");
