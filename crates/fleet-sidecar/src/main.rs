//! Fleet status sidecar
//!
//! Runs next to each worker and reports the pod's status to the fleet
//! controller.

mod client;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use client::StatusClient;
use server::PodState;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fleet status sidecar
#[derive(Parser, Debug)]
#[command(name = "statuspod")]
#[command(author, version, about = "Reports pod status to the fleet controller", long_about = None)]
pub struct Cli {
    /// Controller URL status is pushed to
    #[arg(long, env = "STATUSPOD_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Pod name to report (falls back to $HOSTNAME)
    #[arg(long, env = "POD_NAME")]
    pub name: Option<String>,

    /// Port of the local status server
    #[arg(long, env = "STATUSPOD_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between periodic status pushes
    #[arg(long, env = "STATUSPOD_INTERVAL", default_value_t = 10)]
    pub interval: u64,
}

impl Cli {
    fn pod_name(&self) -> Result<String> {
        match &self.name {
            Some(name) if !name.is_empty() => Ok(name.clone()),
            _ => std::env::var("HOSTNAME").context("No --name given and HOSTNAME is not set"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let name = cli.pod_name()?;
    let client = StatusClient::new(&cli.url)?;

    info!(pod = %name, controller = %client.endpoint(), "Starting status sidecar");
    let state = PodState::new(name, client);

    let period = Duration::from_secs(cli.interval.max(1));
    let reporter = tokio::spawn(server::report_loop(state.clone(), period));
    let server = tokio::spawn(server::serve(cli.port, state.clone()));

    tokio::select! {
        result = server => {
            reporter.abort();
            result
                .context("Status server task failed")?
                .context("Status server failed")?;
        }
        _ = shutdown_signal() => {
            info!("Termination signal received");
            reporter.abort();
            state.terminate().await;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["statuspod", "--name", "fleet-a"]).unwrap();
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.interval, 10);
        assert_eq!(cli.pod_name().unwrap(), "fleet-a");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "statuspod",
            "--url",
            "http://fleet.default:8080",
            "--name",
            "fleet-b",
            "--port",
            "9090",
            "--interval",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.url, "http://fleet.default:8080");
        assert_eq!(cli.port, 9090);
        assert_eq!(cli.interval, 3);
    }
}
