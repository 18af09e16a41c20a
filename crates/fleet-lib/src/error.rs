//! Error types for the fleet controller

use thiserror::Error;

/// Errors surfaced by an [`Orchestrator`](crate::orchestrator::Orchestrator)
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to connect to cluster: {0}")]
    Connection(String),

    #[error("orchestration API error: {0}")]
    Api(String),

    #[error("pod watch failed: {0}")]
    Watch(String),

    #[error("pod watch stream closed")]
    WatchClosed,
}

impl OrchestratorError {
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Invalid fleet configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("image must not be empty")]
    EmptyImage,

    #[error("pod spec namespace {spec} does not match fleet namespace {fleet}")]
    NamespaceMismatch { spec: String, fleet: String },

    #[error("min_pods must be at least 1")]
    NoPods,

    #[error("min_pods ({min}) exceeds max_pods ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("target_usage must be in (0, 1), got {0}")]
    TargetUsageOutOfRange(f64),
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;
