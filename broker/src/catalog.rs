//! Model catalog loading (spec §6 "Model catalog file").
//!
//! A declarative TOML file listing each tool: id, aliases, provider,
//! adapter key, underlying model name, description, context window,
//! default timeout, capability flags, default parameter values. Loaded at
//! startup; reload requires restart (the file is read once, in
//! [`crate::lifecycle::wire`]).

use crate::config::ConfigError;
use broker_types::{Capability, ParamRoute, ParamSpec, ToolDescriptor};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Top-level shape of the model catalog file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    /// Every tool this broker instance can dispatch.
    pub tools: Vec<CatalogEntry>,
}

/// One catalog entry, describing a single dispatchable tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    /// Unique tool id, exposed to clients as the MCP tool name.
    pub id: String,
    /// Alternate names clients may call this tool by.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Provider family: `openai`, `anthropic`, `ollama`, `local-cli`, or
    /// `local` (the in-process token counter).
    pub provider: String,
    /// Opaque key identifying which adapter configuration to bind (for
    /// `local-cli`, the program name; otherwise unused beyond `provider`).
    #[serde(default)]
    pub adapter_key: String,
    /// Underlying model name passed to the provider (e.g. `gpt-4.1`).
    #[serde(default)]
    pub model_name: String,
    /// Human-readable description surfaced in `tools/list`.
    pub description: String,
    /// Declared context window, in tokens.
    #[serde(default = "default_context_window")]
    pub context_window: u64,
    /// Default per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Capability flags: `vision`, `vector_store`, `session`,
    /// `structured_output`, `reasoning_effort`, `temperature`.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Default adapter parameter values merged beneath whatever the caller
    /// supplies.
    #[serde(default)]
    pub default_params: serde_json::Value,
}

fn default_context_window() -> u64 {
    128_000
}

fn default_timeout_ms() -> u64 {
    120_000
}

/// Load and parse the catalog file at `path`.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<CatalogFile, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a catalog entry's capability strings into the typed set, silently
/// dropping names this build does not recognize (forward-compatible with
/// catalog files written against a newer capability list).
fn parse_capabilities(names: &[String]) -> HashSet<Capability> {
    names
        .iter()
        .filter_map(|name| match name.as_str() {
            "vision" => Some(Capability::Vision),
            "vector_store" => Some(Capability::VectorStore),
            "session" => Some(Capability::Session),
            "structured_output" => Some(Capability::StructuredOutput),
            "reasoning_effort" => Some(Capability::ReasoningEffort),
            "temperature" => Some(Capability::Temperature),
            _ => None,
        })
        .collect()
}

/// Build the chat tool's JSON input schema and parameter routing table.
/// Every chat-style tool shares the same surface: a prompt, optional file
/// inputs, an optional session id, and an optional explicit vector-store
/// list — only the provider/model/capabilities differ per catalog entry.
fn chat_params(capabilities: &HashSet<Capability>) -> Vec<ParamSpec> {
    let mut params = vec![
        ParamSpec {
            name: "prompt".to_string(),
            route: ParamRoute::Prompt,
            required: true,
        },
        ParamSpec {
            name: "context_paths".to_string(),
            route: ParamRoute::Adapter,
            required: false,
        },
        ParamSpec {
            name: "attachment_paths".to_string(),
            route: ParamRoute::VectorStore,
            required: false,
        },
        ParamSpec {
            name: "priority_paths".to_string(),
            route: ParamRoute::Adapter,
            required: false,
        },
    ];
    if capabilities.contains(&Capability::Session) {
        params.push(ParamSpec {
            name: "session_id".to_string(),
            route: ParamRoute::Session,
            required: false,
        });
    }
    if capabilities.contains(&Capability::VectorStore) {
        params.push(ParamSpec {
            name: "vector_store_ids".to_string(),
            route: ParamRoute::VectorStore,
            required: false,
        });
    }
    if capabilities.contains(&Capability::StructuredOutput) {
        params.push(ParamSpec {
            name: "structured_output_schema".to_string(),
            route: ParamRoute::Adapter,
            required: false,
        });
    }
    if capabilities.contains(&Capability::Temperature) {
        params.push(ParamSpec {
            name: "temperature".to_string(),
            route: ParamRoute::Adapter,
            required: false,
        });
    }
    params
}

fn chat_input_schema(params: &[ParamSpec]) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for param in params {
        let schema = match param.name.as_str() {
            "prompt" | "session_id" => serde_json::json!({"type": "string"}),
            "context_paths" | "attachment_paths" | "priority_paths" => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
            "vector_store_ids" => serde_json::json!({"type": "array", "items": {"type": "string"}}),
            "structured_output_schema" => serde_json::json!({"type": "object"}),
            "temperature" => serde_json::json!({"type": "number"}),
            _ => serde_json::json!({}),
        };
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(serde_json::Value::String(param.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": serde_json::Value::Object(properties),
        "required": required,
    })
}

/// Build the [`ToolDescriptor`] for a chat-style catalog entry.
pub fn to_chat_descriptor(entry: &CatalogEntry) -> ToolDescriptor {
    let capabilities = parse_capabilities(&entry.capabilities);
    let params = chat_params(&capabilities);
    let input_schema = chat_input_schema(&params);
    ToolDescriptor {
        name: entry.id.clone(),
        description: entry.description.clone(),
        input_schema,
        capabilities,
        params,
        provider_family: entry.provider.clone(),
        model_name: entry.model_name.clone(),
        context_window: entry.context_window,
        default_timeout_ms: entry.default_timeout_ms,
    }
}
