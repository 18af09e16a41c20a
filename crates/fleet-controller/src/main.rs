//! Fleet Controller
//!
//! Keeps a group of worker pods alive in one namespace and scales it to the
//! occupancy the pods report about themselves.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fleet_lib::{
    health::{components, HealthRegistry},
    KubeOrchestrator, StatusTable, StructuredLogger, Watcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fleet Controller
#[derive(Parser)]
#[command(name = "fleet-controller")]
#[command(author, version, about = "Occupancy-driven pod fleet controller", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the namespace, pods and service, then watch and scale the fleet
    Start(StartArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Configuration file (toml, yaml or json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Namespace to run the fleet in
    #[arg(long)]
    pub namespace: Option<String>,

    /// Image of the pods
    #[arg(long)]
    pub image: Option<String>,

    /// Startup command of the pods' container, given after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Number of pods created at bootstrap; the fleet never shrinks below it
    #[arg(long, alias = "numberOfPods")]
    pub number_of_pods: Option<usize>,

    /// Live pod count above which no pod is created
    #[arg(long)]
    pub max_pods: Option<usize>,

    /// Occupancy ratio the fleet is scaled toward, in (0, 1)
    #[arg(long)]
    pub target_usage: Option<f64>,

    /// Port of the fleet service
    #[arg(long)]
    pub port: Option<u16>,

    /// Periodic reconciliation interval in seconds (0 disables)
    #[arg(long)]
    pub ticker: Option<u64>,

    /// Port of the status ingestion server
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => start(args).await,
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let config = config::ControllerConfig::load(&args)?;
    let fleet = config
        .fleet_config()
        .context("Invalid fleet configuration")?;

    let logger = StructuredLogger::new(&fleet.namespace);
    logger.log_startup(CONTROLLER_VERSION, &fleet.pod_spec.image, fleet.min_pods);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ORCHESTRATOR).await;
    health_registry.register(components::WATCHER).await;
    health_registry.register(components::INGEST).await;

    info!("Connecting to Kubernetes");
    let orchestrator = KubeOrchestrator::connect(config.kubeconfig.clone())
        .await
        .context("Failed to connect to Kubernetes")?;

    let (table, changes) = StatusTable::new(Vec::<String>::new());
    let watcher = Watcher::new(Arc::new(orchestrator), fleet.clone(), table.clone())
        .context("Invalid fleet configuration")?
        .with_health(health_registry.clone());

    // Serve before bootstrap so early pushes from new pods are not lost
    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(config.listen_port, app_state, table));

    info!("Bootstrapping fleet");
    let pods = watcher
        .create(fleet.service_port)
        .await
        .context("Failed to bootstrap fleet")?;
    info!(count = pods.len(), "Fleet bootstrapped");
    health_registry.set_ready(true).await;

    tokio::select! {
        result = watcher.watch(changes) => {
            if let Err(e) = &result {
                error!(error = %e, "Watcher stopped");
                health_registry.set_unhealthy(components::WATCHER, e.to_string()).await;
            }
            result.context("Reconciliation loop terminated")?;
        }
        result = api_handle => {
            health_registry.set_unhealthy(components::INGEST, "server stopped").await;
            result
                .context("API server task failed")?
                .context("API server failed")?;
        }
        _ = shutdown_signal() => {
            logger.log_shutdown("signal received");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
