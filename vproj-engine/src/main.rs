//! vproj - domain enrichment and 3D projection pipeline
//!
//! `vproj run <domain>` streams a domain's members, rates them, projects the
//! ratings into 3D, fetches images, and prints the result as JSON.
//! `vproj serve` exposes the same workflow over HTTP with an SSE log stream.
//!
//! Workflow log entries go to stderr through tracing; stdout carries only the
//! result JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vproj_common::config::{default_config_path, load_config, TomlConfig};
use vproj_common::{LogBroadcaster, LogLevel};
use vproj_engine::config::{CliOverrides, EngineConfig};
use vproj_engine::models::WorkflowState;
use vproj_engine::services::RemoteServices;
use vproj_engine::workflow::{WorkflowOrchestrator, WorkflowRequest};
use vproj_engine::AppState;

const LOG_BUS_CAPACITY: usize = 1024;

/// Command-line arguments for vproj
#[derive(Parser, Debug)]
#[command(name = "vproj")]
#[command(about = "Stream, rate, project and illustrate the members of a domain")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/vproj/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct EndpointArgs {
    /// Domain member stream endpoint
    #[arg(long, global = true, value_name = "URL")]
    stream_url: Option<String>,

    /// Schema and rating endpoint
    #[arg(long, global = true, value_name = "URL")]
    attributes_url: Option<String>,

    /// Image lookup endpoint
    #[arg(long, global = true, value_name = "URL")]
    image_url: Option<String>,

    /// Concurrent rating calls per arrival batch (default: unbounded)
    #[arg(long, global = true, value_name = "N")]
    max_concurrent_ratings: Option<usize>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    request_timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one workflow and print the result
    Run {
        /// Domain to enumerate (e.g. "colors")
        domain: String,

        /// Model identifier passed to the stream service
        #[arg(long)]
        model: Option<String>,

        /// Write the result JSON here instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:5780", env = "VPROJ_BIND")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    init_tracing(&toml_config);

    match cli.config.clone().or_else(default_config_path) {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: built-in defaults"),
    }

    let model = match &cli.command {
        Command::Run { model, .. } => model.clone(),
        Command::Serve { .. } => None,
    };
    let overrides = CliOverrides {
        stream_url: cli.endpoints.stream_url.clone(),
        attributes_url: cli.endpoints.attributes_url.clone(),
        image_url: cli.endpoints.image_url.clone(),
        model,
        max_concurrent_ratings: cli.endpoints.max_concurrent_ratings,
        request_timeout_secs: cli.endpoints.request_timeout_secs,
    };
    let engine_config = EngineConfig::resolve(&overrides, &toml_config);

    let services =
        RemoteServices::http(&engine_config).context("Failed to build HTTP clients")?;
    let orchestrator = WorkflowOrchestrator::new(services, engine_config.params.clone());
    let log_bus = Arc::new(LogBroadcaster::new(LOG_BUS_CAPACITY));

    match cli.command {
        Command::Run { domain, output, .. } => {
            run_once(orchestrator, log_bus, domain, engine_config.model, output).await
        }
        Command::Serve { bind } => serve(orchestrator, log_bus, engine_config.model, bind).await,
    }
}

/// RUST_LOG wins, then the config file's level
fn init_tracing(config: &TomlConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_once(
    orchestrator: WorkflowOrchestrator,
    log_bus: Arc<LogBroadcaster>,
    domain: String,
    model: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let domain = domain.trim().to_string();
    if domain.is_empty() {
        anyhow::bail!("Domain must not be empty");
    }

    let problems = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&problems);
    let listener = log_bus.subscribe(move |entry| {
        if matches!(entry.level, LogLevel::Warning | LogLevel::Error) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let result = orchestrator
        .run(&WorkflowRequest::new(domain, model), Arc::clone(&log_bus))
        .await;
    log_bus.unsubscribe(listener);

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    match &output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Result written to {}", path.display());
        }
        None => println!("{}", json),
    }

    info!(
        members = result.domain_members.len(),
        rated = result.rated_attributes.len(),
        successful = result.successful_count(),
        projections = result.projection_iterations().len(),
        image_batches = result.batches.len(),
        warnings_and_errors = problems.load(Ordering::Relaxed),
        "Run summary"
    );

    if result.state == WorkflowState::Failed {
        let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
        anyhow::bail!("Workflow failed: {}", reason);
    }
    Ok(())
}

async fn serve(
    orchestrator: WorkflowOrchestrator,
    log_bus: Arc<LogBroadcaster>,
    default_model: String,
    bind: SocketAddr,
) -> Result<()> {
    info!("Starting vproj HTTP service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(orchestrator, log_bus, default_model);
    let app = vproj_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
