//! In-memory orchestrator for tests

use super::{async_trait, Orchestrator, PodEventStream};
use crate::error::{OrchestratorError, Result};
use crate::models::{PodEvent, PodRecord};
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Operations that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    CreateNamespace,
    CreatePod,
    CreateService,
    ListPods,
    DeletePod,
    WatchPods,
}

/// Pod as stored by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePod {
    pub record: PodRecord,
    pub image: String,
    pub command: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    namespaces: HashSet<String>,
    /// (namespace, name) -> port
    services: BTreeMap<(String, String), u16>,
    /// Insertion-ordered, so `list_pods` is deterministic
    pods: Vec<FakePod>,
    failures: HashMap<FailOn, VecDeque<OrchestratorError>>,
    deleted: Vec<String>,
}

/// Deterministic stand-in for a cluster.
///
/// Pods, namespaces and services live in memory. Errors are queued per
/// operation with [`FakeOrchestrator::fail_next`]; watch events are pushed
/// through the sender returned by [`FakeOrchestrator::event_sender`].
pub struct FakeOrchestrator {
    state: Mutex<FakeState>,
    event_tx: Mutex<Option<mpsc::UnboundedSender<Result<PodEvent>>>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<PodEvent>>>>,
}

impl Default for FakeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(FakeState::default()),
            event_tx: Mutex::new(Some(event_tx)),
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Seed live pods in `namespace`
    pub fn with_pods<I, S>(self, namespace: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.lock();
            for name in names {
                state.pods.push(FakePod {
                    record: PodRecord::new(name, namespace),
                    image: String::new(),
                    command: Vec::new(),
                });
            }
        }
        self
    }

    /// Make the next call of `op` fail with `error`; queued errors fire in order
    pub fn fail_next(&self, op: FailOn, error: OrchestratorError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Handle for injecting watch events
    pub fn event_sender(&self) -> mpsc::UnboundedSender<Result<PodEvent>> {
        match &*self.event_tx.lock().unwrap_or_else(|e| e.into_inner()) {
            Some(tx) => tx.clone(),
            None => mpsc::unbounded_channel().0,
        }
    }

    /// Drop the fake's own sender; the watch stream ends once every handed-out
    /// sender is dropped as well
    pub fn close_watch(&self) {
        self.event_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Names of live pods in `namespace`, in creation order
    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .pods
            .iter()
            .filter(|p| p.record.namespace == namespace)
            .map(|p| p.record.name.clone())
            .collect()
    }

    pub fn pods(&self) -> Vec<FakePod> {
        self.lock().pods.clone()
    }

    /// Names of pods removed through `delete_pod`, in call order
    pub fn deleted_pods(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.lock().namespaces.contains(namespace)
    }

    /// All services as `(namespace, name, port)`
    pub fn services(&self) -> Vec<(String, String, u16)> {
        self.lock()
            .services
            .iter()
            .map(|((ns, name), port)| (ns.clone(), name.clone(), *port))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread poisons the lock; the state itself is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_failure(state: &mut FakeState, op: FailOn) -> Result<()> {
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let mut state = self.lock();
        Self::take_failure(&mut state, FailOn::CreateNamespace)?;

        if !state.namespaces.insert(namespace.to_string()) {
            return Err(OrchestratorError::already_exists("namespace", namespace));
        }
        Ok(())
    }

    async fn create_pod(
        &self,
        namespace: &str,
        name: &str,
        image: &str,
        command: &[String],
    ) -> Result<()> {
        let mut state = self.lock();
        Self::take_failure(&mut state, FailOn::CreatePod)?;

        if state
            .pods
            .iter()
            .any(|p| p.record.namespace == namespace && p.record.name == name)
        {
            return Err(OrchestratorError::already_exists("pod", name));
        }

        state.pods.push(FakePod {
            record: PodRecord::new(name, namespace),
            image: image.to_string(),
            command: command.to_vec(),
        });
        Ok(())
    }

    async fn create_service(&self, namespace: &str, name: &str, port: u16) -> Result<()> {
        let mut state = self.lock();
        Self::take_failure(&mut state, FailOn::CreateService)?;

        let key = (namespace.to_string(), name.to_string());
        if state.services.contains_key(&key) {
            return Err(OrchestratorError::already_exists("service", name));
        }
        state.services.insert(key, port);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodRecord>> {
        let mut state = self.lock();
        Self::take_failure(&mut state, FailOn::ListPods)?;

        Ok(state
            .pods
            .iter()
            .filter(|p| p.record.namespace == namespace)
            .map(|p| p.record.clone())
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        Self::take_failure(&mut state, FailOn::DeletePod)?;

        let position = state
            .pods
            .iter()
            .position(|p| p.record.namespace == namespace && p.record.name == name)
            .ok_or_else(|| OrchestratorError::not_found("pod", name))?;
        state.pods.remove(position);
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn watch_pods(&self, _namespace: &str) -> Result<PodEventStream> {
        {
            let mut state = self.lock();
            Self::take_failure(&mut state, FailOn::WatchPods)?;
        }

        let rx = self
            .event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| OrchestratorError::Watch("pods are already being watched".into()))?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(stream.boxed())
    }
}
