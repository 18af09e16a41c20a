//! Controller configuration
//!
//! Layered from built-in defaults, an optional config file, `FLEET_*`
//! environment variables and finally command-line flags.

use crate::StartArgs;
use anyhow::{Context, Result};
use fleet_lib::{ConfigError, FleetConfig, PodSpec};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Namespace the fleet lives in
    pub namespace: String,

    /// Container image of the fleet's pods
    pub image: String,

    /// Startup command of the fleet's container (image default when empty)
    #[serde(default)]
    pub command: Vec<String>,

    /// Pods created at bootstrap and floor for scale-down
    pub number_of_pods: usize,

    /// Creation ceiling
    pub max_pods: usize,

    /// Occupancy the fleet is scaled toward
    pub target_usage: f64,

    /// Port exposed by the fleet service
    pub service_port: u16,

    /// Periodic reconciliation interval in seconds (0 disables)
    pub ticker_secs: u64,

    /// Port of the ingestion/health/metrics HTTP server
    pub listen_port: u16,

    /// Kubeconfig path; in-cluster or ~/.kube/config when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl ControllerConfig {
    /// Load configuration, letting flags override environment and file values
    pub fn load(args: &StartArgs) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("namespace", "default")?
            .set_default("image", "redis")?
            .set_default("command", Vec::<String>::new())?
            .set_default("number_of_pods", 3_i64)?
            .set_default("max_pods", fleet_lib::config::DEFAULT_MAX_PODS as i64)?
            .set_default("target_usage", fleet_lib::config::DEFAULT_TARGET_USAGE)?
            .set_default("service_port", 6379_i64)?
            .set_default("ticker_secs", 10_i64)?
            .set_default("listen_port", 8080_i64)?;

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix("FLEET")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("command"),
            )
            .set_override_option("namespace", args.namespace.clone())?
            .set_override_option("image", args.image.clone())?
            .set_override_option("number_of_pods", args.number_of_pods.map(|n| n as i64))?
            .set_override_option("max_pods", args.max_pods.map(|n| n as i64))?
            .set_override_option("target_usage", args.target_usage)?
            .set_override_option("service_port", args.port.map(i64::from))?
            .set_override_option("ticker_secs", args.ticker.map(|s| s as i64))?
            .set_override_option("listen_port", args.listen_port.map(i64::from))?
            .set_override_option(
                "kubeconfig",
                args.kubeconfig
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?;

        if !args.command.is_empty() {
            builder = builder.set_override("command", args.command.clone())?;
        }

        builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Build and validate the fleet configuration handed to the watcher
    pub fn fleet_config(&self) -> Result<FleetConfig, ConfigError> {
        let pod_spec = PodSpec::new(&self.namespace, &self.image, self.command.clone());
        let resync = (self.ticker_secs > 0).then(|| Duration::from_secs(self.ticker_secs));

        let fleet = FleetConfig::new(pod_spec, self.number_of_pods, self.service_port)
            .with_max_pods(self.max_pods)
            .with_target_usage(self.target_usage)
            .with_resync_interval(resync);
        fleet.validate()?;
        Ok(fleet)
    }
}
