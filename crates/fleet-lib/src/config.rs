//! Fleet configuration

use crate::error::ConfigError;
use crate::models::PodSpec;
use std::time::Duration;

/// Upper bound on live pods above which no pod is created
pub const DEFAULT_MAX_PODS: usize = 10;

/// Occupancy the watcher scales toward
pub const DEFAULT_TARGET_USAGE: f64 = 0.80;

/// Immutable fleet configuration, built once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    pub namespace: String,
    pub pod_spec: PodSpec,
    /// Bootstrap size and floor below which the fleet is never shrunk
    pub min_pods: usize,
    /// Creation ceiling
    pub max_pods: usize,
    pub target_usage: f64,
    pub service_port: u16,
    /// Periodic reconciliation; `None` reconciles on events only
    pub resync_interval: Option<Duration>,
}

impl FleetConfig {
    pub fn new(pod_spec: PodSpec, min_pods: usize, service_port: u16) -> Self {
        Self {
            namespace: pod_spec.namespace.clone(),
            pod_spec,
            min_pods,
            max_pods: DEFAULT_MAX_PODS,
            target_usage: DEFAULT_TARGET_USAGE,
            service_port,
            resync_interval: None,
        }
    }

    pub fn with_target_usage(mut self, target_usage: f64) -> Self {
        self.target_usage = target_usage;
        self
    }

    pub fn with_max_pods(mut self, max_pods: usize) -> Self {
        self.max_pods = max_pods;
        self
    }

    pub fn with_resync_interval(mut self, interval: Option<Duration>) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Check the invariants the watcher relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.pod_spec.namespace != self.namespace {
            return Err(ConfigError::NamespaceMismatch {
                spec: self.pod_spec.namespace.clone(),
                fleet: self.namespace.clone(),
            });
        }
        if self.pod_spec.image.is_empty() {
            return Err(ConfigError::EmptyImage);
        }
        if self.min_pods == 0 {
            return Err(ConfigError::NoPods);
        }
        if self.min_pods > self.max_pods {
            return Err(ConfigError::MinAboveMax {
                min: self.min_pods,
                max: self.max_pods,
            });
        }
        if !(self.target_usage > 0.0 && self.target_usage < 1.0) {
            return Err(ConfigError::TargetUsageOutOfRange(self.target_usage));
        }
        Ok(())
    }
}
