//! Core data models for the fleet controller

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workload descriptor shared by every pod in the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub namespace: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
}

impl PodSpec {
    pub fn new(
        namespace: impl Into<String>,
        image: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            image: image.into(),
            command,
        }
    }
}

/// Self-reported lifecycle status of a worker pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    /// Idle and schedulable for new work
    Ready,
    /// Currently doing work
    Occupied,
    /// Going away; never stored in the status table
    Terminated,
}

impl PodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodStatus::Ready => "ready",
            PodStatus::Occupied => "occupied",
            PodStatus::Terminated => "terminated",
        }
    }

    /// Flip between ready and occupied; terminated stays terminated
    pub fn toggled(self) -> Self {
        match self {
            PodStatus::Ready => PodStatus::Occupied,
            PodStatus::Occupied => PodStatus::Ready,
            PodStatus::Terminated => PodStatus::Terminated,
        }
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PodStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(PodStatus::Ready),
            "occupied" => Ok(PodStatus::Occupied),
            "terminated" => Ok(PodStatus::Terminated),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pod status {0:?}")]
pub struct UnknownStatus(pub String);

/// Status push sent by a sidecar to `POST /statuss`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Status", alias = "status")]
    pub status: PodStatus,
}

impl StatusReport {
    pub fn new(name: impl Into<String>, status: PodStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Pod as seen by the orchestration layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    /// Orchestrator phase (Pending, Running, Failed, ...) when known
    pub phase: Option<String>,
}

impl PodRecord {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: None,
        }
    }
}

/// Pod lifecycle events delivered by the watch stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodEvent {
    /// A pod was created or modified
    Applied(PodRecord),
    /// A pod was deleted
    Deleted(PodRecord),
    /// The watch was (re)established; carries the full current pod list
    Restarted(Vec<PodRecord>),
}

impl PodEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PodEvent::Applied(_) => "applied",
            PodEvent::Deleted(_) => "deleted",
            PodEvent::Restarted(_) => "restarted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_report_wire_format() {
        let report = StatusReport::new("fleet-1a2b3c4d", PodStatus::Occupied);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["Name"], "fleet-1a2b3c4d");
        assert_eq!(json["Status"], "occupied");
    }

    #[test]
    fn test_status_report_accepts_lowercase_fields() {
        let report: StatusReport =
            serde_json::from_str(r#"{"name":"fleet-a","status":"ready"}"#).unwrap();
        assert_eq!(report.status, PodStatus::Ready);
        assert_eq!(report.name, "fleet-a");
    }

    #[test]
    fn test_status_report_rejects_unknown_status() {
        let result: Result<StatusReport, _> =
            serde_json::from_str(r#"{"Name":"fleet-a","Status":"sleeping"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_pod_status_from_str() {
        assert_eq!("terminated".parse::<PodStatus>(), Ok(PodStatus::Terminated));
        assert!("Ready".parse::<PodStatus>().is_err());
    }

    #[test]
    fn test_pod_status_toggle() {
        assert_eq!(PodStatus::Ready.toggled(), PodStatus::Occupied);
        assert_eq!(PodStatus::Occupied.toggled(), PodStatus::Ready);
        assert_eq!(PodStatus::Terminated.toggled(), PodStatus::Terminated);
    }
}
