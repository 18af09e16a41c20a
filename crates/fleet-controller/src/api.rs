//! HTTP API: status ingestion, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use fleet_lib::{
    health::{ComponentStatus, HealthRegistry},
    ingest, StatusTable,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self { health_registry }
    }
}

/// Returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Returns 200 once the fleet is bootstrapped, 503 before
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, table: StatusTable) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
        .merge(ingest::create_router(table))
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>, table: StatusTable) -> anyhow::Result<()> {
    let app = create_router(state, table);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use fleet_lib::health::components;
    use fleet_lib::{PodStatus, UsageReport};
    use tower::ServiceExt;

    async fn setup() -> (Router, Arc<AppState>, StatusTable) {
        let health_registry = HealthRegistry::new();
        health_registry.register(components::WATCHER).await;
        let state = Arc::new(AppState::new(health_registry));
        let (table, _changes) = StatusTable::new(["fleet-a", "fleet-b"]);
        (create_router(state.clone(), table.clone()), state, table)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_readyz_before_and_after_bootstrap() {
        let (app, state, _table) = setup().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.health_registry.set_ready(true).await;
        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ready"], true);
    }

    #[tokio::test]
    async fn test_healthz_reports_unhealthy_watcher() {
        let (app, state, _table) = setup().await;
        state
            .health_registry
            .set_unhealthy(components::WATCHER, "watch stream closed")
            .await;

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_status_push_is_routed_to_table() {
        let (app, _state, table) = setup().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/statuss")
                    .body(Body::from(r#"{"Name":"fleet-b","Status":"occupied"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(table.get("fleet-b").await, Some(PodStatus::Occupied));
        assert_eq!(table.snapshot().await, UsageReport::new(1, 1));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _state, _table) = setup().await;
        fleet_lib::FleetMetrics::new().inc_status_updates();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("fleet_controller_status_updates_total"));
    }
}
