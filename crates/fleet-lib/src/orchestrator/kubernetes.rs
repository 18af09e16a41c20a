//! Kubernetes implementation of the orchestration contract

use super::{async_trait, Orchestrator, PodEventStream};
use crate::error::{OrchestratorError, Result};
use crate::models::{PodEvent, PodRecord};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{
    Container, Namespace, Pod, PodSpec as K8sPodSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use kube::Client;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Label selecting every pod of a fleet; its value is the namespace
pub const APP_LABEL: &str = "app";
/// Label carrying the pod's own name
pub const NAME_LABEL: &str = "name";

/// Labels attached to a fleet pod
pub fn fleet_labels(namespace: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), namespace.to_string()),
        (NAME_LABEL.to_string(), name.to_string()),
    ])
}

fn fleet_selector(namespace: &str) -> String {
    format!("{}={}", APP_LABEL, namespace)
}

/// Orchestrator backed by a live Kubernetes API server
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
}

impl KubeOrchestrator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an explicit kubeconfig, or the default
    /// in-cluster / `~/.kube/config` resolution when `None`
    pub async fn connect(kubeconfig: Option<PathBuf>) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(&path).map_err(|e| {
                    OrchestratorError::Connection(format!(
                        "failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| OrchestratorError::Connection(e.to_string()))?;

                Client::try_from(config)
                    .map_err(|e| OrchestratorError::Connection(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| OrchestratorError::Connection(e.to_string()))?,
        };

        info!("Connected to Kubernetes");
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Translate a kube error, recognising the conflict and missing-object cases
fn map_error(err: kube::Error, kind: &'static str, name: &str) -> OrchestratorError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            OrchestratorError::already_exists(kind, name)
        }
        kube::Error::Api(resp) if resp.code == 404 => OrchestratorError::not_found(kind, name),
        other => OrchestratorError::Api(format!("{} {}: {}", kind, name, other)),
    }
}

/// Watch only the fleet's own pods, matching `list_pods`
fn watch_config(namespace: &str) -> watcher::Config {
    watcher::Config::default().labels(&fleet_selector(namespace))
}

fn pod_record(pod: &Pod) -> PodRecord {
    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: pod.status.as_ref().and_then(|s| s.phase.clone()),
    }
}

fn pod_event(event: watcher::Event<Pod>) -> PodEvent {
    match event {
        watcher::Event::Applied(pod) => PodEvent::Applied(pod_record(&pod)),
        watcher::Event::Deleted(pod) => PodEvent::Deleted(pod_record(&pod)),
        watcher::Event::Restarted(pods) => PodEvent::Restarted(pods.iter().map(pod_record).collect()),
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        api.create(&PostParams::default(), &ns)
            .await
            .map_err(|e| map_error(e, "namespace", namespace))?;
        debug!(namespace = %namespace, "Namespace created");
        Ok(())
    }

    async fn create_pod(
        &self,
        namespace: &str,
        name: &str,
        image: &str,
        command: &[String],
    ) -> Result<()> {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(fleet_labels(namespace, name)),
                ..Default::default()
            },
            spec: Some(K8sPodSpec {
                containers: vec![Container {
                    name: "main".to_string(),
                    image: Some(image.to_string()),
                    command: (!command.is_empty()).then(|| command.to_vec()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        self.pods(namespace)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| map_error(e, "pod", name))?;
        debug!(namespace = %namespace, pod = %name, "Pod created");
        Ok(())
    }

    async fn create_service(&self, namespace: &str, name: &str, port: u16) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("NodePort".to_string()),
                ports: Some(vec![ServicePort {
                    port: i32::from(port),
                    ..Default::default()
                }]),
                selector: Some(BTreeMap::from([(
                    APP_LABEL.to_string(),
                    namespace.to_string(),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        };

        api.create(&PostParams::default(), &service)
            .await
            .map_err(|e| map_error(e, "service", name))?;
        debug!(namespace = %namespace, service = %name, port, "Service created");
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodRecord>> {
        let params = ListParams::default().labels(&fleet_selector(namespace));
        let pods = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(|e| map_error(e, "pods", namespace))?;

        // Pods already being torn down no longer count toward the fleet
        Ok(pods
            .items
            .iter()
            .filter(|pod| pod.metadata.deletion_timestamp.is_none())
            .map(pod_record)
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_error(e, "pod", name))?;
        debug!(namespace = %namespace, pod = %name, "Pod deletion requested");
        Ok(())
    }

    async fn watch_pods(&self, namespace: &str) -> Result<PodEventStream> {
        let api = self.pods(namespace);

        // Surface permission and connectivity problems when the watch is opened
        api.list(&ListParams::default().labels(&fleet_selector(namespace)).limit(1))
            .await
            .map_err(|e| OrchestratorError::Watch(e.to_string()))?;

        let stream = watcher(api, watch_config(namespace))
            .default_backoff()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Some(Ok::<_, OrchestratorError>(pod_event(event))),
                    Err(e) => {
                        // The watcher re-lists after backoff; nothing to propagate
                        warn!(error = %e, "Pod watch interrupted, retrying");
                        None
                    }
                }
            })
            .boxed();

        info!(namespace = %namespace, "Watching pods");
        Ok(stream)
    }
}
