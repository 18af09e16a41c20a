//! Status ingestion endpoint
//!
//! Worker sidecars push `{"Name": ..., "Status": ...}` to `POST /statuss`.
//! The body is parsed by hand so every malformed payload maps to
//! `400 Bad Request` and leaves the status table untouched.

use crate::models::StatusReport;
use crate::observability::FleetMetrics;
use crate::status::StatusTable;
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use tracing::{info, warn};

/// Path the sidecars post to
pub const STATUS_PATH: &str = "/statuss";

#[derive(Clone)]
pub struct IngestState {
    table: StatusTable,
    metrics: FleetMetrics,
}

impl IngestState {
    pub fn new(table: StatusTable) -> Self {
        Self {
            table,
            metrics: FleetMetrics::new(),
        }
    }
}

/// Parse a status push, rejecting unknown statuses and empty names
pub fn parse_report(body: &[u8]) -> Result<StatusReport, String> {
    let report: StatusReport = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if report.name.is_empty() {
        return Err("pod name must not be empty".to_string());
    }
    Ok(report)
}

async fn update_status(
    State(state): State<IngestState>,
    body: Bytes,
) -> (StatusCode, String) {
    let report = match parse_report(&body) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Rejected status push");
            return (StatusCode::BAD_REQUEST, e);
        }
    };

    info!(pod = %report.name, status = %report.status, "Status push received");
    state.table.update(&report.name, report.status).await;
    state.metrics.inc_status_updates();

    (StatusCode::OK, String::new())
}

/// Router serving the ingestion endpoint
pub fn create_router(table: StatusTable) -> Router {
    Router::new()
        .route(STATUS_PATH, post(update_status))
        .with_state(IngestState::new(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PodStatus;
    use crate::report::UsageReport;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn push(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(STATUS_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_push_updates_table() {
        let (table, mut changes) = StatusTable::new(["fleet-a"]);
        let app = create_router(table.clone());

        let response = app
            .oneshot(push(r#"{"Name":"fleet-a","Status":"occupied"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(table.get("fleet-a").await, Some(PodStatus::Occupied));
        assert!(changes.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_terminated_push_removes_pod() {
        let (table, _changes) = StatusTable::new(["fleet-a", "fleet-b"]);
        let app = create_router(table.clone());

        let response = app
            .oneshot(push(r#"{"Name":"fleet-a","Status":"terminated"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(table.snapshot().await, UsageReport::new(1, 0));
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected_without_mutation() {
        let (table, mut changes) = StatusTable::new(["fleet-a"]);
        let app = create_router(table.clone());

        let response = app.oneshot(push("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(table.snapshot().await, UsageReport::new(1, 0));
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let (table, _changes) = StatusTable::new(["fleet-a"]);
        let app = create_router(table.clone());

        let response = app
            .oneshot(push(r#"{"Name":"fleet-a","Status":"busy"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(table.get("fleet-a").await, Some(PodStatus::Ready));
    }

    #[tokio::test]
    async fn test_missing_name_is_rejected() {
        let (table, _changes) = StatusTable::new(Vec::<String>::new());
        let app = create_router(table.clone());

        for body in [r#"{"Status":"ready"}"#, r#"{"Name":"","Status":"ready"}"#] {
            let response = app.clone().oneshot(push(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(table.is_empty().await);
    }

    #[test]
    fn test_parse_report_accepts_lowercase_fields() {
        let report = parse_report(br#"{"name":"fleet-a","status":"ready"}"#).unwrap();
        assert_eq!(report, StatusReport::new("fleet-a", PodStatus::Ready));
    }
}
