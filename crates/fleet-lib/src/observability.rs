//! Observability infrastructure for the fleet controller
//!
//! Provides:
//! - Prometheus metrics (reconciliation passes and latency, scaling actions, fleet occupancy)
//! - Structured JSON logging with tracing

use crate::report::UsageReport;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for reconciliation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FleetMetricsInner> = OnceLock::new();

struct FleetMetricsInner {
    reconcile_latency_seconds: Histogram,
    reconcile_passes: IntCounter,
    reconcile_errors: IntCounter,
    pods_created: IntCounter,
    pods_deleted: IntCounter,
    status_updates: IntCounter,
    ready_pods: IntGauge,
    occupied_pods: IntGauge,
    live_pods: IntGauge,
}

impl FleetMetricsInner {
    fn new() -> Self {
        Self {
            reconcile_latency_seconds: register_histogram!(
                "fleet_controller_reconcile_latency_seconds",
                "Time spent in one reconciliation pass",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register reconcile_latency_seconds"),

            reconcile_passes: register_int_counter!(
                "fleet_controller_reconcile_passes_total",
                "Total number of reconciliation passes"
            )
            .expect("Failed to register reconcile_passes"),

            reconcile_errors: register_int_counter!(
                "fleet_controller_reconcile_errors_total",
                "Total number of failed reconciliation passes"
            )
            .expect("Failed to register reconcile_errors"),

            pods_created: register_int_counter!(
                "fleet_controller_pods_created_total",
                "Total number of pods created by the controller"
            )
            .expect("Failed to register pods_created"),

            pods_deleted: register_int_counter!(
                "fleet_controller_pods_deleted_total",
                "Total number of pods deleted by the controller"
            )
            .expect("Failed to register pods_deleted"),

            status_updates: register_int_counter!(
                "fleet_controller_status_updates_total",
                "Total number of status pushes accepted from pods"
            )
            .expect("Failed to register status_updates"),

            ready_pods: register_int_gauge!(
                "fleet_controller_ready_pods",
                "Pods currently reporting ready"
            )
            .expect("Failed to register ready_pods"),

            occupied_pods: register_int_gauge!(
                "fleet_controller_occupied_pods",
                "Pods currently reporting occupied"
            )
            .expect("Failed to register occupied_pods"),

            live_pods: register_int_gauge!(
                "fleet_controller_live_pods",
                "Fleet pods listed by the orchestration API"
            )
            .expect("Failed to register live_pods"),
        }
    }
}

/// Fleet metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct FleetMetrics {
    _private: (),
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FleetMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FleetMetricsInner {
        GLOBAL_METRICS.get_or_init(FleetMetricsInner::new)
    }

    /// Record one finished reconciliation pass
    pub fn observe_reconcile(&self, duration_secs: f64, success: bool) {
        let inner = self.inner();
        inner.reconcile_latency_seconds.observe(duration_secs);
        inner.reconcile_passes.inc();
        if !success {
            inner.reconcile_errors.inc();
        }
    }

    pub fn inc_pods_created(&self) {
        self.inner().pods_created.inc();
    }

    pub fn inc_pods_deleted(&self) {
        self.inner().pods_deleted.inc();
    }

    pub fn inc_status_updates(&self) {
        self.inner().status_updates.inc();
    }

    pub fn set_occupancy(&self, report: &UsageReport) {
        self.inner().ready_pods.set(report.ready_pods as i64);
        self.inner().occupied_pods.set(report.occupied_pods as i64);
    }

    pub fn set_live_pods(&self, count: usize) {
        self.inner().live_pods.set(count as i64);
    }
}

/// Structured logger for fleet lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Log controller startup
    pub fn log_startup(&self, version: &str, image: &str, min_pods: usize) {
        info!(
            event = "controller_started",
            namespace = %self.namespace,
            controller_version = %version,
            image = %image,
            min_pods = min_pods,
            "Fleet controller started"
        );
    }

    /// Log a finished bootstrap
    pub fn log_bootstrap(&self, pods: &[String], service_port: u16) {
        info!(
            event = "fleet_bootstrapped",
            namespace = %self.namespace,
            pods = ?pods,
            service_port = service_port,
            "Fleet bootstrapped"
        );
    }

    /// Log a scaling decision that changed the fleet
    pub fn log_scaling(&self, report: &UsageReport, delta: i64, live: usize, changed: i64) {
        info!(
            event = "pods_scaled",
            namespace = %self.namespace,
            ready = report.ready_pods,
            occupied = report.occupied_pods,
            usage = ?report.usage(),
            delta = delta,
            live_pods = live,
            changed = changed,
            "Fleet scaled"
        );
    }

    /// Log the watch loop ending
    pub fn log_watch_terminated(&self, reason: &str) {
        warn!(
            event = "watch_terminated",
            namespace = %self.namespace,
            reason = %reason,
            "Reconciliation loop terminated"
        );
    }

    /// Log controller shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            namespace = %self.namespace,
            reason = %reason,
            "Fleet controller shutting down"
        );
    }
}
