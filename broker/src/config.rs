//! Configuration file plus environment overlay (spec §6, §9).
//!
//! A TOML file supplies every recognized option; unknown keys are rejected
//! (`#[serde(deny_unknown_fields)]`, per spec §6: "Unknown keys are
//! rejected"). A handful of provider credentials can also be supplied by
//! environment variable, read after the file and overlaid only where set,
//! the same layering order the original implementation's
//! `config.get_settings()` uses.

use broker_types::{Classify, ErrorKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file's contents did not parse as valid configuration.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Per-provider credentials and endpoint overrides (spec §6: "provider
/// credentials and endpoints").
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderConfig {
    /// OpenAI API key. Overridable by `BROKER_OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// OpenAI API base URL, defaults to the adapter's built-in default.
    pub openai_base_url: Option<String>,
    /// Anthropic API key. Overridable by `BROKER_ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,
    /// Anthropic API base URL, defaults to the adapter's built-in default.
    pub anthropic_base_url: Option<String>,
    /// Ollama base URL, defaults to `http://localhost:11434`.
    pub ollama_base_url: Option<String>,
    /// Local CLI agent program (e.g. a `codex` or `claude` binary on PATH).
    pub local_cli_program: Option<String>,
    /// Arguments passed to `local_cli_program` on every invocation.
    pub local_cli_args: Vec<String>,
}

/// The broker's full configuration (spec §6 "Configuration").
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the shared SQLite database file.
    pub database_path: PathBuf,
    /// Path to the model catalog file (spec §6 "Model catalog file").
    pub model_catalog_path: PathBuf,
    /// Provider credentials and endpoints.
    #[serde(default)]
    pub providers: ProviderConfig,
    /// Tokenizer choice. Only `"char-ratio"` (the built-in fallback) is
    /// implemented; reserved for a future real-tokenizer plug-in.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    /// Fraction of a tool's declared context window reserved for inline
    /// file content (spec §4.4's inline-token-budget fraction).
    #[serde(default = "default_inline_budget_fraction")]
    pub inline_token_budget_fraction: f64,
    /// Vector-store lease TTL in seconds (spec §4.5).
    #[serde(default = "default_vector_store_ttl_secs")]
    pub vector_store_ttl_secs: i64,
    /// Session continuity cache TTL in seconds (spec §4.6).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    /// Job record TTL in seconds (spec §4.8).
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: i64,
    /// Job worker poll interval in milliseconds.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
    /// Size of the bounded worker pool used for CPU-bound context assembly.
    /// Defaults to hardware parallelism per spec §5.
    pub thread_pool_size: Option<usize>,
    /// Destination for the structured-log sink. Only `"stderr"` is
    /// implemented (stdout is reserved for the JSON-RPC channel).
    #[serde(default = "default_log_destination")]
    pub log_destination: String,
    /// Whether `.gitignore`/`.ignore` rules are honored while gathering
    /// context files.
    #[serde(default = "default_true")]
    pub respect_ignore_files: bool,
    /// Safety cap on the number of vector stores a provider account may
    /// hold before the manager starts evicting (spec §6 "safety
    /// thresholds (provider vector-store cap)").
    #[serde(default = "default_vector_store_capacity_cap")]
    pub vector_store_capacity_cap: u64,
    /// Whether an evicted vector-store entry also deletes the provider-side
    /// store (Open Question: vector-store eviction policy; see DESIGN.md).
    #[serde(default = "default_true")]
    pub delete_vector_store_on_evict: bool,
    /// Maximum accepted length, in bytes, of a single line on the JSON-RPC
    /// transport; longer lines are rejected with a parse error rather than
    /// parsed (spec §4.1, §6).
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_tokenizer() -> String {
    "char-ratio".to_string()
}

fn default_inline_budget_fraction() -> f64 {
    0.5
}

fn default_vector_store_ttl_secs() -> i64 {
    86_400
}

fn default_session_ttl_secs() -> i64 {
    7 * 86_400
}

fn default_job_ttl_secs() -> i64 {
    3 * 86_400
}

fn default_job_poll_interval_ms() -> u64 {
    500
}

fn default_log_destination() -> String {
    "stderr".to_string()
}

fn default_vector_store_capacity_cap() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_max_line_bytes() -> usize {
    broker_mcp::DEFAULT_MAX_LINE_BYTES
}

impl Config {
    /// Load configuration from `path`, then overlay recognized environment
    /// variables on top of it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overlay();
        Ok(config)
    }

    /// Overlay `BROKER_*` environment variables, file values remaining
    /// authoritative for anything not set in the environment.
    fn apply_env_overlay(&mut self) {
        if let Ok(v) = std::env::var("BROKER_OPENAI_API_KEY") {
            self.providers.openai_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("BROKER_ANTHROPIC_API_KEY") {
            self.providers.anthropic_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("BROKER_OLLAMA_BASE_URL") {
            self.providers.ollama_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("BROKER_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "broker.sqlite"
            model_catalog_path = "catalog.toml"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tokenizer, "char-ratio");
        assert_eq!(config.vector_store_ttl_secs, 86_400);
        assert!(config.respect_ignore_files);
        assert_eq!(config.max_line_bytes, broker_mcp::DEFAULT_MAX_LINE_BYTES);
    }

    #[test]
    fn max_line_bytes_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "broker.sqlite"
            model_catalog_path = "catalog.toml"
            max_line_bytes = 4096
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_line_bytes, 4096);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "broker.sqlite"
            model_catalog_path = "catalog.toml"
            not_a_real_option = true
            "#,
        )
        .unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn env_overlay_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "broker.sqlite"
            model_catalog_path = "catalog.toml"

            [providers]
            openai_api_key = "from-file"
            "#,
        )
        .unwrap();

        std::env::set_var("BROKER_OPENAI_API_KEY", "from-env");
        let config = Config::load(&path).unwrap();
        std::env::remove_var("BROKER_OPENAI_API_KEY");

        assert_eq!(config.providers.openai_api_key.as_deref(), Some("from-env"));
    }
}
