//! Parameter router: splits raw `tools/call` arguments into
//! [`SplitArgs`](broker_types::SplitArgs) buckets per a tool's declared
//! [`ParamRoute`] table (spec §3, §4.3).
//!
//! The router is total over declared parameters and closed over undeclared
//! ones: every name present in the raw arguments must be declared by the
//! tool, and every declared required parameter must be present. Both
//! failures classify as `invalid_request` (spec §7).

use crate::error::ToolError;
use broker_types::{ParamRoute, SplitArgs, ToolDescriptor};

/// Route raw JSON-RPC call arguments into prompt/adapter/vector_store/session
/// buckets per `descriptor`'s parameter table.
///
/// `raw_args` must be a JSON object (or null/missing, treated as empty); any
/// other shape is rejected. Ordering within each bucket follows the
/// descriptor's declared parameter order, not the argument object's
/// insertion order, so prompt concatenation is deterministic regardless of
/// what the client sent.
pub fn split_args(descriptor: &ToolDescriptor, raw_args: &serde_json::Value) -> Result<SplitArgs, ToolError> {
    let args_obj = match raw_args {
        serde_json::Value::Null => serde_json::Map::new(),
        serde_json::Value::Object(map) => map.clone(),
        other => {
            return Err(ToolError::InvalidRequest(format!(
                "tool arguments must be a JSON object, got {other}"
            )))
        }
    };

    let route_table = descriptor.route_table();
    for key in args_obj.keys() {
        if !route_table.contains_key(key.as_str()) {
            return Err(ToolError::InvalidRequest(format!(
                "unknown parameter `{key}` for tool `{}`",
                descriptor.name
            )));
        }
    }

    for required in descriptor.required_params() {
        if !args_obj.contains_key(&required.name) {
            return Err(ToolError::InvalidRequest(format!(
                "missing required parameter `{}` for tool `{}`",
                required.name, descriptor.name
            )));
        }
    }

    let mut split = SplitArgs::default();
    for spec in &descriptor.params {
        let Some(value) = args_obj.get(&spec.name) else {
            continue;
        };
        match spec.route {
            ParamRoute::Prompt => split.prompt.push((spec.name.clone(), value.clone())),
            ParamRoute::Adapter => {
                split.adapter.insert(spec.name.clone(), value.clone());
            }
            ParamRoute::VectorStore => split.vector_store.push((spec.name.clone(), value.clone())),
            ParamRoute::Session => split.session.push((spec.name.clone(), value.clone())),
        }
    }

    Ok(split)
}
