//! Startup wiring, in order: configuration, migrations, database handles,
//! caches, registry, adapters, dispatcher, framer (spec §9).
//!
//! [`serve`] is the only entry point `main.rs` needs for the default
//! subcommand; the `migrate*` helpers below back the CLI's maintenance
//! subcommands and never touch the rest of this module's wiring.

use crate::catalog::{load_catalog, to_chat_descriptor};
use crate::config::{Config, ConfigError};
use crate::memory_backend::OpenAiMemoryBackend;
use crate::metrics::{DiagnosticsTool, Metrics};
use crate::pipeline::Pipeline;
use crate::tools::chat::ChatTool;
use crate::tools::count_tokens::CountProjectTokensTool;
use crate::tools::jobs::{CancelJobTool, PollJobTool, StartJobTool};
use crate::tools::memory::{SearchProjectMemoryTool, SearchSessionAttachmentsTool};
use crate::vectorstore_backend::OpenAiVectorStoreBackend;
use async_trait::async_trait;
use broker_adapter::{Adapter, AnthropicAdapter, LocalCliAdapter, OllamaAdapter, OpenAiAdapter, TokenCounterAdapter};
use broker_db::{DbError, SqliteMemoryRepository, SqliteVectorStoreRepository};
use broker_jobs::{RegistryJobHandler, SqliteJobQueue, Worker};
use broker_mcp::{Dispatcher, MessageReader, PeerSink};
use broker_memory::{MemoryBackend, MemoryError, MemoryHit, MemoryRepository, MemoryStore};
use broker_session::{SessionStore, SqliteSessionStore};
use broker_tool::ToolRegistry;
use broker_types::{Classify, ErrorKind};
use broker_vectorstore::VectorStoreManager;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SERVER_NAME: &str = "broker";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Everything that can go wrong bringing the broker up, every variant an
/// [`ErrorKind::Initialization`]-or-narrower failure the process is
/// allowed to abort on (spec §7).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Configuration file missing, malformed, or rejected an unknown key.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Database open or migration failure.
    #[error(transparent)]
    Db(#[from] DbError),
    /// Failed to create the dedicated memory vector store at startup.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl Classify for LifecycleError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Db(e) => e.kind(),
            Self::Memory(e) => e.kind(),
        }
    }
}

/// Stands in for a real [`MemoryBackend`] when no provider credential is
/// configured to back one. Every call fails rather than the two memory
/// tools being left out of `tools/list` depending on configuration.
struct UnconfiguredMemoryBackend;

#[async_trait]
impl MemoryBackend for UnconfiguredMemoryBackend {
    async fn index(&self, _text: &str) -> Result<String, MemoryError> {
        Err(MemoryError::IndexFailed("no memory provider configured".to_string()))
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<MemoryHit>, MemoryError> {
        Err(MemoryError::SearchFailed("no memory provider configured".to_string()))
    }
}

/// Bring up every subsystem and run the stdio JSON-RPC loop until the peer
/// disconnects (EOF on stdin) or the process receives a shutdown signal.
pub async fn serve(config_path: PathBuf) -> Result<(), LifecycleError> {
    let config = Config::load(&config_path)?;
    let pool = broker_db::run_migrations(&config.database_path).await?;
    info!(database_path = %config.database_path.display(), "database ready");

    let sessions: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(pool.clone()));
    let vs_repo = Arc::new(SqliteVectorStoreRepository::new(pool.clone()));
    let memory_repo: Arc<dyn MemoryRepository> = Arc::new(SqliteMemoryRepository::new(pool.clone()));
    let job_queue = Arc::new(SqliteJobQueue::new(pool.clone()));
    let metrics = Metrics::new();

    let vector_store = build_vector_store_manager(&config, vs_repo);
    let memory = Arc::new(MemoryStore::new(build_memory_backend(&config).await?, memory_repo));
    let adapters = build_adapters(&config);

    let catalog = load_catalog(&config.model_catalog_path)?;
    let inline_budget = inline_budget_tokens(&config, &catalog.tools);

    let pipeline = Arc::new(Pipeline::new(
        vector_store,
        sessions,
        memory.clone(),
        metrics.clone(),
        inline_budget,
        config.session_ttl_secs,
        config.respect_ignore_files,
    ));

    let mut registry = ToolRegistry::new();
    for entry in &catalog.tools {
        let descriptor = to_chat_descriptor(entry);
        let Some(adapter) = adapters.get(&entry.provider).cloned() else {
            warn!(tool = %entry.id, provider = %entry.provider, "no adapter configured for provider, skipping catalog entry");
            continue;
        };
        let names = std::iter::once(entry.id.clone()).chain(entry.aliases.iter().cloned());
        for name in names {
            let mut descriptor = descriptor.clone();
            descriptor.name = name;
            registry.register(Arc::new(ChatTool::new(descriptor, adapter.clone(), pipeline.clone())));
        }
    }
    registry.register(Arc::new(CountProjectTokensTool::new(config.respect_ignore_files)));
    registry.register(Arc::new(SearchProjectMemoryTool::new(memory.clone())));
    registry.register(Arc::new(SearchSessionAttachmentsTool::new(memory)));
    registry.register(Arc::new(DiagnosticsTool::new(metrics.clone())));

    // `start_job` needs to look up its target among everything registered
    // above; nothing ever job-targets `start_job`/`poll_job`/`cancel_job`
    // themselves, so it is handed this snapshot rather than the final
    // registry those three are about to join.
    let lookup_registry = Arc::new(registry);
    registry = ToolRegistry::new();
    for tool in lookup_registry.iter() {
        registry.register(tool.clone());
    }
    registry.register(Arc::new(StartJobTool::new(job_queue.clone(), lookup_registry, config.job_ttl_secs)));
    registry.register(Arc::new(PollJobTool::new(job_queue.clone())));
    registry.register(Arc::new(CancelJobTool::new(job_queue.clone())));
    let registry = Arc::new(registry);

    let shutdown = CancellationToken::new();
    let handler = Arc::new(RegistryJobHandler::new(registry.clone()));
    let worker = Worker::new(job_queue, handler, Duration::from_millis(config.job_poll_interval_ms), shutdown.clone());
    let worker_task = tokio::spawn(async move { worker.run().await });

    let sink = Arc::new(PeerSink::new(tokio::io::stdout()));
    let dispatcher = Arc::new(Dispatcher::new(registry, sink, SERVER_NAME, SERVER_VERSION));

    run_stdio_loop(dispatcher, shutdown, config.max_line_bytes).await;
    let _ = worker_task.await;

    Ok(())
}

async fn run_stdio_loop<W>(dispatcher: Arc<Dispatcher<W>>, shutdown: CancellationToken, max_line_bytes: usize)
where
    W: tokio::io::AsyncWrite + Unpin + Send + Sync + 'static,
{
    let mut reader = MessageReader::new(tokio::io::stdin()).with_max_line_bytes(max_line_bytes);
    loop {
        tokio::select! {
            message = reader.next_message() => {
                match message {
                    Ok(Some(msg)) => dispatcher.handle(msg).await,
                    Ok(None) => {
                        info!("peer closed stdin, shutting down");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "stdin read failed, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, shutting down");
                break;
            }
        }
    }
    shutdown.cancel();
}

fn build_vector_store_manager(
    config: &Config,
    repo: Arc<SqliteVectorStoreRepository>,
) -> Option<Arc<VectorStoreManager<OpenAiVectorStoreBackend, SqliteVectorStoreRepository>>> {
    let key = config.providers.openai_api_key.as_ref()?;
    let mut backend = OpenAiVectorStoreBackend::new(key.clone(), config.vector_store_capacity_cap);
    if let Some(url) = &config.providers.openai_base_url {
        backend = backend.base_url(url.clone());
    }
    Some(Arc::new(VectorStoreManager::new(
        Arc::new(backend),
        repo,
        config.vector_store_ttl_secs,
        config.delete_vector_store_on_evict,
    )))
}

async fn build_memory_backend(config: &Config) -> Result<Arc<dyn MemoryBackend>, LifecycleError> {
    let Some(key) = &config.providers.openai_api_key else {
        return Ok(Arc::new(UnconfiguredMemoryBackend));
    };
    let base_url = config.providers.openai_base_url.clone().unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
    let vector_store_id = OpenAiMemoryBackend::create_memory_store(key, &base_url).await?;
    Ok(Arc::new(OpenAiMemoryBackend::new(key.clone(), vector_store_id).base_url(base_url)))
}

fn build_adapters(config: &Config) -> HashMap<String, Arc<dyn Adapter>> {
    let mut adapters: HashMap<String, Arc<dyn Adapter>> = HashMap::new();

    if let Some(key) = &config.providers.openai_api_key {
        let mut adapter = OpenAiAdapter::new(key.clone());
        if let Some(url) = &config.providers.openai_base_url {
            adapter = adapter.base_url(url.clone());
        }
        adapters.insert("openai".to_string(), Arc::new(adapter));
    }

    if let Some(key) = &config.providers.anthropic_api_key {
        let mut adapter = AnthropicAdapter::new(key.clone());
        if let Some(url) = &config.providers.anthropic_base_url {
            adapter = adapter.base_url(url.clone());
        }
        adapters.insert("anthropic".to_string(), Arc::new(adapter));
    }

    let mut ollama = OllamaAdapter::new();
    if let Some(url) = &config.providers.ollama_base_url {
        ollama = ollama.base_url(url.clone());
    }
    adapters.insert("ollama".to_string(), Arc::new(ollama));

    if let Some(program) = &config.providers.local_cli_program {
        let adapter = LocalCliAdapter::new(program.clone(), config.providers.local_cli_args.clone());
        adapters.insert("local-cli".to_string(), Arc::new(adapter));
    }

    adapters.insert("local".to_string(), Arc::new(TokenCounterAdapter::new()));
    adapters
}

/// The pipeline shares one inline-token budget across every chat tool
/// (spec §4.4); derive it from the fraction configured and the widest
/// context window any catalog entry declares, so a single small tool
/// doesn't starve the budget for the rest.
fn inline_budget_tokens(config: &Config, entries: &[crate::catalog::CatalogEntry]) -> u64 {
    let widest = entries.iter().map(|e| e.context_window).max().unwrap_or(128_000);
    ((widest as f64) * config.inline_token_budget_fraction) as u64
}

/// Run pending migrations and report the version landed on (`migrate`
/// subcommand).
pub async fn migrate(config_path: PathBuf) -> Result<u32, LifecycleError> {
    let config = Config::load(&config_path)?;
    broker_db::run_migrations(&config.database_path).await?;
    Ok(broker_db::status(&config.database_path).await?)
}

/// Report the currently applied migration version without applying
/// anything (`migrate-status` subcommand).
pub async fn migrate_status(config_path: PathBuf) -> Result<u32, LifecycleError> {
    let config = Config::load(&config_path)?;
    Ok(broker_db::status(&config.database_path).await?)
}

/// Roll the schema back to `to_version` (`migrate-rollback` subcommand).
pub async fn migrate_rollback(config_path: PathBuf, to_version: u32) -> Result<(), LifecycleError> {
    let config = Config::load(&config_path)?;
    broker_db::rollback_to(&config.database_path, to_version).await?;
    Ok(())
}
