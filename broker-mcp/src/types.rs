//! Line-delimited JSON-RPC 2.0 message shapes (spec §4.1, §6).
//!
//! The wire format is exactly JSON-RPC 2.0; what's MCP-specific is the
//! method names (`initialize`, `tools/list`, `tools/call`, and the two
//! notifications) the dispatcher recognizes, not the envelope itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request id, per JSON-RPC 2.0 either a string or a number. Carried as
/// a [`broker_types::McpRequestId`] once inside the broker so the rest of
/// the system never has to branch on which JSON type the client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRequestId {
    /// A numeric id.
    Number(i64),
    /// A string id.
    String(String),
}

impl std::fmt::Display for RawRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// One line of input, after JSON parsing, before method dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Always `"2.0"`; not checked strictly since the spec cares about
    /// behavior, not pedantic protocol-version enforcement.
    #[serde(default, rename = "jsonrpc")]
    pub _jsonrpc: Option<String>,
    /// Present on requests (which expect a response), absent on
    /// notifications.
    pub id: Option<RawRequestId>,
    /// The JSON-RPC method name.
    pub method: String,
    /// Method parameters, if any.
    #[serde(default)]
    pub params: Value,
}

impl InboundMessage {
    /// Whether this message is a notification (no `id`, no response
    /// expected).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A successful JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    jsonrpc: &'static str,
    id: RawRequestId,
    result: Value,
}

impl ResponseMessage {
    /// Build a success response.
    pub fn success(id: RawRequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    code: i64,
    message: String,
}

/// A JSON-RPC error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponseMessage {
    jsonrpc: &'static str,
    id: RawRequestId,
    error: ErrorObject,
}

impl ErrorResponseMessage {
    /// Build an error response.
    pub fn new(id: RawRequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ErrorObject {
                code,
                message: message.into(),
            },
        }
    }
}

/// JSON-RPC reserved error codes this broker uses (spec §7's mapping onto
/// the wire).
pub mod error_codes {
    /// The JSON-RPC request object was malformed.
    pub const PARSE_ERROR: i64 = -32700;
    /// `method` named something the dispatcher doesn't recognize.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Parameters failed validation (`ErrorKind::InvalidRequest`).
    pub const INVALID_PARAMS: i64 = -32602;
    /// Anything else — an `isError: true` tool result is preferred over
    /// this wherever spec §7 allows it; this is the fallback for
    /// dispatcher-level failures that happen before a tool even runs.
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_id_is_not_a_notification() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#).unwrap();
        assert!(!msg.is_notification());
        assert_eq!(msg.id, Some(RawRequestId::Number(1)));
    }

    #[test]
    fn notification_has_no_id() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn string_id_round_trips() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"tools/list"}"#).unwrap();
        assert_eq!(msg.id, Some(RawRequestId::String("abc".to_string())));
    }
}
