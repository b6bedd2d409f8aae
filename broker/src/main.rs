//! Entry point: initialize logging, parse the CLI, and dispatch to the
//! right lifecycle path (spec §9).

mod catalog;
mod cli;
mod config;
mod lifecycle;
mod memory_backend;
mod metrics;
mod pipeline;
mod tools;
mod vectorstore_backend;

use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    // Stdout is reserved for the JSON-RPC channel (spec §4.1); every log
    // line goes to stderr instead, matching `config.log_destination`'s
    // only implemented value.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.command() {
        Command::Serve => run(lifecycle::serve(config_path)).await,
        Command::Migrate => {
            run(async move {
                let version = lifecycle::migrate(config_path).await?;
                tracing::info!(version, "migrations applied");
                Ok(())
            })
            .await
        }
        Command::MigrateStatus => {
            run(async move {
                let version = lifecycle::migrate_status(config_path).await?;
                println!("{version}");
                Ok(())
            })
            .await
        }
        Command::MigrateRollback { to_version } => {
            run(lifecycle::migrate_rollback(config_path, to_version)).await
        }
    }
}

async fn run(fut: impl std::future::Future<Output = Result<(), lifecycle::LifecycleError>>) -> ExitCode {
    match fut.await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            tracing::error!(error = %err, "broker exited with an error");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
