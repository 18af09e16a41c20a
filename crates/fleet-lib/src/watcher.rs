//! Reconciliation watcher
//!
//! Bootstraps the fleet, then waits on the pod watch stream, status table
//! change pulses and an optional resync ticker. Each trigger runs one
//! reconciliation pass to completion before the next event is read, so
//! passes never overlap.

use crate::config::FleetConfig;
use crate::error::{ConfigError, OrchestratorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{PodEvent, PodRecord};
use crate::naming::new_pod_name;
use crate::observability::{FleetMetrics, StructuredLogger};
use crate::orchestrator::Orchestrator;
use crate::status::{StatusChanges, StatusTable};
use futures::StreamExt;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No pod reports status, so occupancy is undefined
    Skipped,
    Unchanged,
    Created(usize),
    Deleted(usize),
}

/// What woke the loop up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    PodDeleted,
    StatusChange,
    Resync,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::PodDeleted => "pod_deleted",
            Trigger::StatusChange => "status_change",
            Trigger::Resync => "resync",
        }
    }
}

/// Keeps the fleet alive and sized to its occupancy
pub struct Watcher {
    orchestrator: Arc<dyn Orchestrator>,
    config: FleetConfig,
    table: StatusTable,
    metrics: FleetMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl Watcher {
    /// Build a watcher over a validated configuration
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        config: FleetConfig,
        table: StatusTable,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let logger = StructuredLogger::new(&config.namespace);
        Ok(Self {
            orchestrator,
            config,
            table,
            metrics: FleetMetrics::new(),
            logger,
            health: None,
        })
    }

    /// Report pass failures as a degraded orchestrator component
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn table(&self) -> &StatusTable {
        &self.table
    }

    /// Create the namespace, `min_pods` pods and the fleet service.
    ///
    /// An existing namespace or service is reused. Any other failure aborts
    /// bootstrap; pods created before the failure are left in place.
    pub async fn create(&self, service_port: u16) -> Result<Vec<String>> {
        let ns = &self.config.namespace;

        info!(namespace = %ns, "Creating namespace");
        ignore_already_exists(self.orchestrator.create_namespace(ns).await)?;

        let pods = self.create_pods(self.config.min_pods).await?;

        info!(namespace = %ns, port = service_port, "Creating service");
        ignore_already_exists(self.orchestrator.create_service(ns, ns, service_port).await)?;

        self.logger.log_bootstrap(&pods, service_port);
        Ok(pods)
    }

    /// Run the reconciliation loop.
    ///
    /// Returns only when the pod watch stream fails or closes; failures of
    /// individual passes are logged and the loop keeps going.
    pub async fn watch(&self, mut changes: StatusChanges) -> Result<()> {
        let mut events = self.orchestrator.watch_pods(&self.config.namespace).await?;
        let mut resync = self.config.resync_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut changes_open = true;

        info!(
            namespace = %self.config.namespace,
            target_usage = self.config.target_usage,
            min_pods = self.config.min_pods,
            max_pods = self.config.max_pods,
            "Starting reconciliation loop"
        );

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => {
                        self.logger.log_watch_terminated(&e.to_string());
                        return Err(e);
                    }
                    None => {
                        self.logger.log_watch_terminated("watch stream closed");
                        return Err(OrchestratorError::WatchClosed);
                    }
                },
                change = changes.recv(), if changes_open => match change {
                    Some(()) => {
                        // Collapse a burst of pulses into one pass; the table is re-read anyway
                        while changes.try_recv().is_ok() {}
                        self.run_reconcile(Trigger::StatusChange).await;
                    }
                    None => {
                        warn!("Status change channel closed");
                        changes_open = false;
                    }
                },
                _ = next_tick(&mut resync) => self.run_reconcile(Trigger::Resync).await,
            }
        }
    }

    async fn handle_event(&self, event: PodEvent) {
        match event {
            PodEvent::Deleted(pod) => {
                info!(pod = %pod.name, "Pod deleted");
                self.table.forget(&pod.name).await;
                self.run_reconcile(Trigger::PodDeleted).await;
            }
            PodEvent::Applied(pod) => {
                debug!(pod = %pod.name, phase = ?pod.phase, "Pod applied");
            }
            PodEvent::Restarted(pods) => {
                info!(count = pods.len(), "Pod watch (re)started");
            }
        }
    }

    async fn run_reconcile(&self, trigger: Trigger) {
        let start = Instant::now();
        let result = self.reconcile().await;
        let elapsed = start.elapsed();
        self.metrics
            .observe_reconcile(elapsed.as_secs_f64(), result.is_ok());

        match result {
            Ok(outcome) => {
                debug!(
                    trigger = trigger.as_str(),
                    outcome = ?outcome,
                    elapsed_ms = elapsed.as_millis(),
                    "Reconciliation pass complete"
                );
                if let Some(health) = &self.health {
                    health.set_healthy(components::ORCHESTRATOR).await;
                }
            }
            Err(e) => {
                error!(
                    trigger = trigger.as_str(),
                    error = %e,
                    "Reconciliation pass failed"
                );
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::ORCHESTRATOR, e.to_string())
                        .await;
                }
            }
        }
    }

    /// Converge the live pod count toward the occupancy target.
    ///
    /// Deletion never goes below `min_pods`, creation never above
    /// `max_pods`. A fleet that has fallen below `min_pods` is refilled even
    /// when occupancy is undefined.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let report = self.table.snapshot().await;
        self.metrics.set_occupancy(&report);
        let delta = report.delta(self.config.target_usage);

        let pods = self.orchestrator.list_pods(&self.config.namespace).await?;
        let live = pods.len();
        self.metrics.set_live_pods(live);

        debug!(
            ready = report.ready_pods,
            occupied = report.occupied_pods,
            delta = ?delta,
            live_pods = live,
            "Computed scale delta"
        );

        let deficit = self.config.min_pods.saturating_sub(live) as i64;
        let wanted = match delta {
            Some(delta) if deficit > 0 => delta.max(deficit),
            Some(delta) => delta,
            None if deficit > 0 => deficit,
            None => {
                debug!("No pod reports status, skipping scaling");
                return Ok(ReconcileOutcome::Skipped);
            }
        };

        if wanted < 0 {
            let removable = live.saturating_sub(self.config.min_pods);
            let count = (wanted.unsigned_abs() as usize).min(removable);
            if count == 0 {
                return Ok(ReconcileOutcome::Unchanged);
            }
            self.delete_pods(&pods[..count]).await?;
            self.logger.log_scaling(&report, wanted, live, -(count as i64));
            Ok(ReconcileOutcome::Deleted(count))
        } else if wanted > 0 && live < self.config.max_pods {
            let count = (wanted as usize).min(self.config.max_pods - live);
            self.create_pods(count).await?;
            self.logger.log_scaling(&report, wanted, live, count as i64);
            Ok(ReconcileOutcome::Created(count))
        } else {
            Ok(ReconcileOutcome::Unchanged)
        }
    }

    async fn create_pods(&self, count: usize) -> Result<Vec<String>> {
        let ns = &self.config.namespace;
        let spec = &self.config.pod_spec;
        let mut created = Vec::with_capacity(count);

        for _ in 0..count {
            let name = new_pod_name(ns);
            self.orchestrator
                .create_pod(ns, &name, &spec.image, &spec.command)
                .await?;
            self.table.track(&name).await;
            self.metrics.inc_pods_created();
            info!(pod = %name, image = %spec.image, "Pod created");
            created.push(name);
        }

        Ok(created)
    }

    async fn delete_pods(&self, pods: &[PodRecord]) -> Result<()> {
        for pod in pods {
            self.orchestrator
                .delete_pod(&self.config.namespace, &pod.name)
                .await?;
            self.table.forget(&pod.name).await;
            self.metrics.inc_pods_deleted();
            info!(pod = %pod.name, "Pod deleted by controller");
        }
        Ok(())
    }
}

fn ignore_already_exists(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_already_exists() => {
            debug!(error = %e, "Reusing existing object");
            Ok(())
        }
        other => other,
    }
}

async fn next_tick(resync: &mut Option<Interval>) {
    match resync {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
