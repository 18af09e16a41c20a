//! Fleet controller library
//!
//! This crate provides the core functionality for:
//! - Occupancy tracking of self-reporting worker pods
//! - Scale-delta computation toward a target occupancy
//! - The reconciliation watcher driving the orchestration API
//! - The status ingestion endpoint
//! - Health checks and observability

pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod naming;
pub mod observability;
pub mod orchestrator;
pub mod report;
pub mod status;
pub mod watcher;

pub use config::FleetConfig;
pub use error::{ConfigError, OrchestratorError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{FleetMetrics, StructuredLogger};
pub use orchestrator::{KubeOrchestrator, Orchestrator};
pub use report::UsageReport;
pub use status::{StatusChanges, StatusTable};
pub use watcher::{ReconcileOutcome, Watcher};
