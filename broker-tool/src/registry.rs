//! Object-safe tool abstraction and registry (spec §3, §4.3).

use crate::error::ToolError;
use broker_types::ToolDescriptor;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Object-safe trait for tool implementations.
///
/// Any tool source — a local service (token counter, job control), an
/// upstream-model-backed chat tool, or a bridged MCP server — implements
/// this trait and is stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// Immutable descriptor for this tool (name, schema, capabilities,
    /// routing table). Registered once at startup and never mutated.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Execute the tool with the given already-routed input, honoring
    /// `cancel_signal` at every suspension point.
    fn call(
        &self,
        input: serde_json::Value,
        cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

/// Catalog of tools available to the dispatcher.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name. Registration happens
/// once at startup (spec §3: "Registration occurs once at startup; names
/// are unique"); this type does not enforce uniqueness beyond
/// last-write-wins on `register`, matching the teacher's
/// `neuron_tool::ToolRegistry`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, keyed by its descriptor's name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.descriptor().name.clone(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// All registered tool descriptors, for `tools/list`.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_types::{Capability, ParamRoute, ParamSpec};
    use serde_json::json;
    use std::collections::HashSet;

    struct EchoTool {
        descriptor: ToolDescriptor,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                descriptor: ToolDescriptor {
                    name: name.to_string(),
                    description: "Echoes input back".into(),
                    input_schema: json!({"type": "object"}),
                    capabilities: HashSet::new(),
                    params: vec![ParamSpec {
                        name: "msg".into(),
                        route: ParamRoute::Prompt,
                        required: true,
                    }],
                    provider_family: "local".into(),
                    model_name: "echo".into(),
                    context_window: 0,
                    default_timeout_ms: 1000,
                },
            }
        }
    }

    impl ToolDyn for EchoTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        fn call(
            &self,
            input: serde_json::Value,
            _cancel_signal: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>
        {
            Box::pin(async move { Ok(json!({"echoed": input})) })
        }
    }

    struct FailTool {
        descriptor: ToolDescriptor,
    }

    impl ToolDyn for FailTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        fn call(
            &self,
            _input: serde_json::Value,
            _cancel_signal: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>
        {
            Box::pin(async { Err(ToolError::ExecutionFailed("always fails".into())) })
        }
    }

    #[test]
    fn tool_dyn_is_object_safe_and_send_sync() {
        fn _assert<T: Send + Sync>() {}
        _assert::<Arc<dyn ToolDyn>>();
    }

    #[test]
    fn registry_add_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());
        reg.register(Arc::new(EchoTool::new("echo")));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn registry_overwrite_keeps_one_entry() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo")));
        reg.register(Arc::new(EchoTool::new("echo")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn descriptors_lists_all() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo")));
        reg.register(Arc::new(EchoTool::new("read")));
        let names: Vec<&str> = reg.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"read"));
    }

    #[tokio::test]
    async fn registry_call_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo")));
        let tool = reg.get("echo").unwrap();
        let result = tool
            .call(json!({"msg": "hello"}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, json!({"echoed": {"msg": "hello"}}));
    }

    #[tokio::test]
    async fn registry_call_failing_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool {
            descriptor: EchoTool::new("fail").descriptor,
        }));
        let tool = reg.get("fail").unwrap();
        let result = tool.call(json!({}), CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
