//! Orchestration API contract
//!
//! The watcher drives the cluster only through [`Orchestrator`]. The
//! production implementation talks to Kubernetes through `kube`; the
//! in-memory `FakeOrchestrator` (feature `test-util`) lets tests script
//! pods, errors and watch events deterministically.

#[cfg(any(test, feature = "test-util"))]
mod fake;
mod kubernetes;

#[cfg(any(test, feature = "test-util"))]
pub use fake::{FailOn, FakeOrchestrator, FakePod};
pub use kubernetes::{fleet_labels, KubeOrchestrator, APP_LABEL, NAME_LABEL};

use crate::error::Result;
use crate::models::{PodEvent, PodRecord};
use futures::stream::BoxStream;

pub use async_trait::async_trait;

/// Stream of pod lifecycle events for one namespace
pub type PodEventStream = BoxStream<'static, Result<PodEvent>>;

/// Capabilities the controller needs from the orchestration layer.
///
/// Creation calls report an existing object as
/// [`OrchestratorError::AlreadyExists`](crate::error::OrchestratorError::AlreadyExists);
/// callers decide whether that is fatal.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Create a pod labelled for fleet discovery
    async fn create_pod(
        &self,
        namespace: &str,
        name: &str,
        image: &str,
        command: &[String],
    ) -> Result<()>;

    /// Create a service exposing the fleet's pods on `port`
    async fn create_service(&self, namespace: &str, name: &str, port: u16) -> Result<()>;

    /// List live pods carrying the fleet label of `namespace`
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodRecord>>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    /// Subscribe to pod events in `namespace`
    async fn watch_pods(&self, namespace: &str) -> Result<PodEventStream>;
}
