//! Tool descriptors, capabilities, and parameter routing (spec §3, §4.3).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A capability a tool may declare. Determines what the context assembler
/// and adapter are allowed to do on this tool's behalf (e.g. attach images
/// only if `Vision` is declared).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can receive image attachments.
    Vision,
    /// Can create/reuse a provider vector store.
    VectorStore,
    /// Supports session continuity via `session_id`.
    Session,
    /// Can validate output against a JSON Schema.
    StructuredOutput,
    /// Accepts a `reasoning_effort` adapter parameter.
    ReasoningEffort,
    /// Accepts a `temperature` adapter parameter.
    Temperature,
}

/// Which bucket a declared parameter's value is routed into (spec §3, §4.3).
///
/// The router is total: every declared parameter of a tool has exactly one
/// route, and arguments for parameters the tool did not declare are
/// rejected as `invalid_request`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRoute {
    /// Concatenated in declared order into the rendered prompt.
    Prompt,
    /// Passed as a keyword argument to the adapter call.
    Adapter,
    /// Flows into the context assembler's overflow/attachment input.
    VectorStore,
    /// Enters the session cache lookup (`session_id`).
    Session,
}

/// Declared shape of one parameter on a tool, used by the parameter router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as it appears in `tools/call` arguments.
    pub name: String,
    /// Which bucket this parameter routes to.
    pub route: ParamRoute,
    /// Whether the call must supply this parameter.
    pub required: bool,
}

/// Immutable metadata for a callable tool (spec §3).
///
/// Built once at startup from the model catalog (spec §6) and never
/// mutated; the registry stores these by value behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description, shown to the client in `tools/list`.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
    /// Capabilities this tool supports.
    pub capabilities: HashSet<Capability>,
    /// Declared parameters and their routes.
    pub params: Vec<ParamSpec>,
    /// Upstream provider family this tool is backed by (e.g. `"openai"`,
    /// `"anthropic"`, `"gemini"`, `"local"`).
    pub provider_family: String,
    /// Underlying model/adapter key (implementation-specific string).
    pub model_name: String,
    /// The provider's context window, in tokens.
    pub context_window: u64,
    /// Default timeout for a call to this tool; callers may not override it
    /// (spec §5).
    pub default_timeout_ms: u64,
}

impl ToolDescriptor {
    /// Build the name -> route map used by the parameter router.
    pub fn route_table(&self) -> HashMap<&str, ParamRoute> {
        self.params
            .iter()
            .map(|p| (p.name.as_str(), p.route))
            .collect()
    }

    /// Parameters that must be present in every call.
    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolDescriptor {
        ToolDescriptor {
            name: "chat_with_x".into(),
            description: "desc".into(),
            input_schema: serde_json::json!({"type": "object"}),
            capabilities: [Capability::Session, Capability::VectorStore]
                .into_iter()
                .collect(),
            params: vec![
                ParamSpec {
                    name: "instructions".into(),
                    route: ParamRoute::Prompt,
                    required: true,
                },
                ParamSpec {
                    name: "temperature".into(),
                    route: ParamRoute::Adapter,
                    required: false,
                },
                ParamSpec {
                    name: "session_id".into(),
                    route: ParamRoute::Session,
                    required: false,
                },
            ],
            provider_family: "openai".into(),
            model_name: "gpt-5".into(),
            context_window: 128_000,
            default_timeout_ms: 60_000,
        }
    }

    #[test]
    fn route_table_is_total_over_declared_params() {
        let d = sample();
        let table = d.route_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table["instructions"], ParamRoute::Prompt);
        assert_eq!(table["temperature"], ParamRoute::Adapter);
        assert_eq!(table["session_id"], ParamRoute::Session);
    }

    #[test]
    fn required_params_filters() {
        let d = sample();
        let required: Vec<&str> = d.required_params().map(|p| p.name.as_str()).collect();
        assert_eq!(required, vec!["instructions"]);
    }

    #[test]
    fn capabilities_are_a_set() {
        let d = sample();
        assert!(d.capabilities.contains(&Capability::Session));
        assert!(!d.capabilities.contains(&Capability::Vision));
    }
}
