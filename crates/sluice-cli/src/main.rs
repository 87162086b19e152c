#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sluice_runtime::engine::{PipelineService, RunRequest};
use sluice_runtime::prelude::{ActionRegistry, SourceRegistry, SourceSpec};
use sluice_server::AppState;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// Tracing target constants
const TRACING_TARGET_STARTUP: &str = "sluice_cli::startup";
const TRACING_TARGET_SHUTDOWN: &str = "sluice_cli::shutdown";

#[derive(Debug, Parser)]
#[command(name = "sluice", version, about = "Pull-based data-transformation pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP trigger API.
    Serve {
        /// Address to bind.
        #[arg(long, env = "SLUICE_ADDR", default_value = "127.0.0.1:3031")]
        addr: SocketAddr,
    },
    /// Execute one run request to completion and print its output.
    Run {
        /// Path to a JSON run request (`{ pipeline, source }`).
        config: PathBuf,
        /// Source spec overriding the one in the file, as JSON.
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let service = PipelineService::new(
        ActionRegistry::with_builtins(),
        SourceRegistry::with_builtins(),
    );

    match cli.command {
        Command::Serve { addr } => serve(service, addr).await,
        Command::Run { config, source } => run_config(service, &config, source.as_deref()),
    }
}

/// Serves the trigger API until a shutdown signal arrives.
async fn serve(service: PipelineService, addr: SocketAddr) -> anyhow::Result<()> {
    let router = sluice_server::router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        "serving pipeline API"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "failed to listen for shutdown signal"
        );
        return;
    }
    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "shutdown signal received");
}

/// Runs one configuration file to completion and prints the output
/// sequence as JSON.
fn run_config(
    service: PipelineService,
    path: &Path,
    source_override: Option<&str>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut request: RunRequest =
        serde_json::from_str(&raw).context("invalid run request")?;

    if let Some(source) = source_override {
        let spec: SourceSpec = serde_json::from_str(source).context("invalid source spec")?;
        request.source = spec;
    }

    let outputs = service.run_once(&request).context("pipeline run failed")?;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
