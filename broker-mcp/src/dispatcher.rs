//! Request dispatcher: JSON-RPC method routing, per-call cancellation, and
//! at-most-one-response-per-request-id (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use broker_tool::ToolRegistry;
use broker_types::{Classify, McpRequestId};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::transport::PeerSink;
use crate::types::{error_codes, ErrorResponseMessage, InboundMessage, RawRequestId, ResponseMessage};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Live `tools/call` cancellation handles, keyed by JSON-RPC request id.
///
/// A plain `Mutex<HashMap<..>>` rather than a concurrent map: one lock
/// guards insert/remove/lookup, matching the teacher's single-owner-table
/// discipline, and the critical section is always a handful of map
/// operations, never the call itself.
type RequestTable = Mutex<HashMap<McpRequestId, CancellationToken>>;

/// Dispatches inbound JSON-RPC messages against a tool registry.
///
/// One instance is shared across the lifetime of a single stdio
/// connection. `tools/call` spawns a task per call so a slow provider
/// round-trip never blocks `tools/list` or a `notifications/cancelled` for
/// a different request id from being handled in the meantime.
pub struct Dispatcher<W> {
    registry: Arc<ToolRegistry>,
    sink: Arc<PeerSink<W>>,
    in_flight: Arc<RequestTable>,
    server_name: String,
    server_version: String,
}

impl<W: tokio::io::AsyncWrite + Unpin + Send + Sync + 'static> Dispatcher<W> {
    /// Build a dispatcher over `registry`, writing responses through
    /// `sink`.
    pub fn new(
        registry: Arc<ToolRegistry>,
        sink: Arc<PeerSink<W>>,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sink,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    /// Handle one inbound message. Requests get exactly one response
    /// written to the sink; notifications never produce a response.
    #[instrument(skip(self, msg), fields(method = %msg.method))]
    pub async fn handle(&self, msg: InboundMessage) {
        match msg.method.as_str() {
            "initialize" => self.handle_initialize(msg).await,
            "notifications/initialized" => info!("client initialized"),
            "tools/list" => self.handle_tools_list(msg).await,
            "tools/call" => self.handle_tools_call(msg).await,
            "notifications/cancelled" => self.handle_cancelled(msg).await,
            other => {
                if let Some(id) = msg.id {
                    self.sink
                        .send(&ErrorResponseMessage::new(
                            id,
                            error_codes::METHOD_NOT_FOUND,
                            format!("unknown method: {other}"),
                        ))
                        .await;
                } else {
                    warn!(method = %other, "unknown notification, ignoring");
                }
            }
        }
    }

    async fn handle_initialize(&self, msg: InboundMessage) {
        let Some(id) = msg.id else { return };
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": self.server_name, "version": self.server_version},
        });
        self.sink.send(&ResponseMessage::success(id, result)).await;
    }

    async fn handle_tools_list(&self, msg: InboundMessage) {
        let Some(id) = msg.id else { return };
        let tools: Vec<Value> = self
            .registry
            .descriptors()
            .into_iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "inputSchema": d.input_schema,
                })
            })
            .collect();
        self.sink
            .send(&ResponseMessage::success(id, json!({ "tools": tools })))
            .await;
    }

    async fn handle_tools_call(&self, msg: InboundMessage) {
        let Some(id) = msg.id else { return };

        let name = match msg.params.get("name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                self.sink
                    .send(&ErrorResponseMessage::new(
                        id,
                        error_codes::INVALID_PARAMS,
                        "missing `name`",
                    ))
                    .await;
                return;
            }
        };
        let arguments = msg.params.get("arguments").cloned().unwrap_or(Value::Null);

        let Some(tool) = self.registry.get(&name).cloned() else {
            self.sink
                .send(&ResponseMessage::success(
                    id,
                    tool_error_result(format!("tool not found: {name}")),
                ))
                .await;
            return;
        };

        let request_id = McpRequestId::new(id.to_string());
        let cancel_signal = CancellationToken::new();
        self.in_flight
            .lock()
            .await
            .insert(request_id.clone(), cancel_signal.clone());

        let sink = self.sink.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let outcome = tool.call(arguments, cancel_signal.clone()).await;
            in_flight.lock().await.remove(&request_id);
            // Post-cancel contract (spec §4.2, P1): a cancelled request
            // gets no response on the transport, success or error. Check
            // both the tool's own verdict and the signal directly, since a
            // tool may race past its cancellation check and return `Ok`
            // just as the cancel arrives.
            if matches!(outcome, Err(broker_tool::ToolError::Cancelled)) || cancel_signal.is_cancelled() {
                return;
            }
            let result = match outcome {
                Ok(value) => tool_success_result(value),
                Err(err) => tool_error_result(format!("{err} ({:?})", err.kind())),
            };
            sink.send(&ResponseMessage::success(id, result)).await;
        });
    }

    async fn handle_cancelled(&self, msg: InboundMessage) {
        let Some(raw_id) = msg.params.get("requestId") else {
            warn!("notifications/cancelled missing requestId");
            return;
        };
        let request_id = match raw_id {
            Value::String(s) => McpRequestId::new(s.clone()),
            Value::Number(n) => McpRequestId::new(n.to_string()),
            _ => {
                warn!("notifications/cancelled requestId has unexpected shape");
                return;
            }
        };
        if let Some(token) = self.in_flight.lock().await.get(&request_id) {
            token.cancel();
        }
    }
}

fn tool_success_result(value: Value) -> Value {
    json!({
        "content": [{"type": "text", "text": value.to_string()}],
        "isError": false,
    })
}

fn tool_error_result(message: impl Into<String>) -> Value {
    json!({
        "content": [{"type": "text", "text": message.into()}],
        "isError": true,
    })
}
