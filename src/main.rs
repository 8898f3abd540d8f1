//! jobnode - job scheduler and task pipeline node
//!
//! Main entry point for the jobnode server.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use jobnode_api::{ApiConfig, ApiServer, AppState};
use jobnode_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig, StoreBackend};
use jobnode_core::{FileJobStore, JobStore, MemoryJobStore};
use jobnode_pipeline::{AdapterSettings, TaskPipelineExecutor, default_registry};
use jobnode_scheduler::{Scheduler, SchedulerConfig};

/// jobnode CLI.
#[derive(Parser)]
#[command(name = "jobnode")]
#[command(about = "Job scheduler and task pipeline node")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.jobnode/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node in foreground (default)
    Run {
        /// API host, overrides `server.host`
        #[arg(long)]
        host: Option<String>,

        /// API port, overrides `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration and exit
    Check,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_or_default(&ConfigLoader::default_path())?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if logging.json {
        layers.push(fmt::layer().json().with_target(true).boxed());
    } else {
        layers.push(fmt::layer().with_target(true).with_ansi(true).boxed());
    }

    if let Some(log_dir) = logging.resolved_dir() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("jobnode")
            .filename_suffix("log")
            .max_log_files(30)
            .build(&log_dir)?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Dropping the guard stops the background writer.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        layers.push(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(())
}

fn validate(config: &Config) -> anyhow::Result<()> {
    let warnings = ConfigValidator::validate(config)?.into_result()?;
    for warning in warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn JobStore>> {
    let store: Arc<dyn JobStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryJobStore::new()),
        StoreBackend::File => {
            let path = config.store.resolved_path();
            info!("Using file store at {}", path.display());
            Arc::new(
                FileJobStore::new(&path)
                    .await
                    .with_context(|| format!("Failed to open store at {}", path.display()))?,
            )
        }
    };
    Ok(store)
}

fn adapter_settings(config: &Config) -> anyhow::Result<AdapterSettings> {
    let eth_url = config
        .adapters
        .eth_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("Invalid adapters.eth_url")?;

    Ok(AdapterSettings {
        http_timeout: Duration::from_secs(config.adapters.http_timeout_secs),
        eth_url,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the node in foreground.
async fn run_node(config: Config) -> anyhow::Result<()> {
    info!("Starting jobnode v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config).await?;
    let adapters = Arc::new(default_registry(&adapter_settings(&config)?)?);
    info!("Registered adapters: {}", adapters.types().join(", "));

    let executor = TaskPipelineExecutor::new(store, adapters);
    let scheduler = Arc::new(Scheduler::new(
        executor.clone(),
        SchedulerConfig {
            catch_up_missed_run_at: config.scheduler.catch_up_missed_run_at,
        },
    ));
    scheduler.start().await?;

    let state = Arc::new(AppState::new(executor, Some(scheduler.clone())));
    let server = ApiServer::new(
        ApiConfig::new(config.server.host.clone(), config.server.port),
        state,
    );
    let served = server.run(shutdown_signal()).await;

    scheduler.stop().await?;
    served.with_context(|| format!("API server on {} failed", server.addr()))?;

    info!("jobnode stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Check) => {
            init_tracing(&config.logging)?;
            validate(&config)?;
            info!("Configuration is valid");
            Ok(())
        }
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            init_tracing(&config.logging)?;
            validate(&config)?;
            run_node(config).await
        }
        None => {
            init_tracing(&config.logging)?;
            validate(&config)?;
            run_node(config).await
        }
    }
}
