//! `count_project_tokens`: a local-only tool that walks the given paths
//! and reports an estimated token count, with no provider round-trip
//! (spec §8 scenario 5).

use broker_context::{gather, score::score_file};
use broker_tool::{ToolDyn, ToolError};
use broker_types::{Capability, ParamRoute, ParamSpec, ToolDescriptor};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Counts tokens across a set of filesystem paths using the same scoring
/// pass [`broker_context::assemble`] uses internally, without splitting
/// into inline/overflow sets — this tool only reports a total.
pub struct CountProjectTokensTool {
    descriptor: ToolDescriptor,
    respect_ignore_files: bool,
}

impl CountProjectTokensTool {
    /// Build the tool.
    pub fn new(respect_ignore_files: bool) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "count_project_tokens".to_string(),
                description: "Estimate the total token count of the given paths without sending anything to a provider.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "paths": {"type": "array", "items": {"type": "string"}},
                    },
                    "required": ["paths"],
                }),
                capabilities: HashSet::new(),
                params: vec![ParamSpec {
                    name: "paths".to_string(),
                    route: ParamRoute::Adapter,
                    required: true,
                }],
                provider_family: "local".to_string(),
                model_name: "char-ratio-tokenizer".to_string(),
                context_window: 0,
                default_timeout_ms: 30_000,
            },
            respect_ignore_files,
        }
    }
}

impl ToolDyn for CountProjectTokensTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call(
        &self,
        input: Value,
        cancel_signal: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let paths: Vec<PathBuf> = input
                .get("paths")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::InvalidRequest("`paths` must be an array of strings".to_string()))?
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect();

            let gathered = gather(&paths, self.respect_ignore_files);
            let mut total_tokens = 0u64;
            let mut file_count = 0u64;
            let mut unreadable = Vec::new();

            for path in &gathered.files {
                if cancel_signal.is_cancelled() {
                    return Err(ToolError::Cancelled);
                }
                match score_file(path) {
                    Ok(file_ref) => {
                        total_tokens += file_ref.token_estimate;
                        file_count += 1;
                    }
                    Err(e) => unreadable.push(format!("{}: {e}", path.display())),
                }
            }

            Ok(serde_json::json!({
                "file_count": file_count,
                "estimated_tokens": total_tokens,
                "warnings": gathered.warnings.into_iter().map(|w| w.message).collect::<Vec<_>>(),
                "unreadable": unreadable,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_tokens_across_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "aaaa").unwrap();
        std::fs::write(dir.path().join("b.rs"), "bbbb").unwrap();

        let tool = CountProjectTokensTool::new(true);
        let result = tool
            .call(
                serde_json::json!({"paths": [dir.path().to_string_lossy()]}),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result["file_count"], 2);
        assert_eq!(result["estimated_tokens"], 2);
    }
}
