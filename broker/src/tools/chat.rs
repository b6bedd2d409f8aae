//! `chat_with_<provider>_model`: the thin [`ToolDyn`] shell around
//! [`crate::pipeline::Pipeline::run_chat`] (spec §4.3, §4.7).

use crate::pipeline::Pipeline;
use broker_adapter::Adapter;
use broker_tool::{ToolDyn, ToolError};
use broker_types::{McpRequestId, ToolDescriptor};
use broker_vectorstore::VectorStoreRepository;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One catalog-driven chat tool: a provider adapter plus the shared
/// orchestration pipeline. Every `chat_with_*` tool in the catalog is an
/// instance of this same type, differing only in `descriptor`/`adapter`.
pub struct ChatTool<R: VectorStoreRepository> {
    descriptor: ToolDescriptor,
    adapter: Arc<dyn Adapter>,
    pipeline: Arc<Pipeline<R>>,
}

impl<R: VectorStoreRepository> ChatTool<R> {
    /// Build a chat tool bound to one catalog entry's descriptor and
    /// adapter.
    pub fn new(descriptor: ToolDescriptor, adapter: Arc<dyn Adapter>, pipeline: Arc<Pipeline<R>>) -> Self {
        Self { descriptor, adapter, pipeline }
    }
}

impl<R: VectorStoreRepository + 'static> ToolDyn for ChatTool<R> {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let request_id = McpRequestId::new(uuid::Uuid::new_v4().to_string());
            self.pipeline
                .run_chat(&self.descriptor, self.adapter.as_ref(), request_id, input, cancel_signal)
                .await
        })
    }
}
