//! Pod-local status server
//!
//! Holds the pod's self-reported status, exposes it on `GET /get` and lets
//! the workload flip it with `POST /toggle`. Every change is pushed to the
//! controller right away; [`report_loop`] re-pushes on a fixed interval so
//! a restarted controller relearns the fleet.

use crate::client::StatusClient;
use axum::{extract::State, routing::get, routing::post, Json, Router};
use fleet_lib::{PodStatus, StatusReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Body of `GET /get` and `POST /toggle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodView {
    pub name: String,
    pub status: PodStatus,
}

#[derive(Clone)]
pub struct PodState {
    name: String,
    status: Arc<RwLock<PodStatus>>,
    client: Arc<StatusClient>,
}

impl PodState {
    /// New pod state, starting ready
    pub fn new(name: impl Into<String>, client: StatusClient) -> Self {
        Self {
            name: name.into(),
            status: Arc::new(RwLock::new(PodStatus::Ready)),
            client: Arc::new(client),
        }
    }

    pub async fn view(&self) -> PodView {
        PodView {
            name: self.name.clone(),
            status: *self.status.read().await,
        }
    }

    /// Flip ready/occupied and return the new status
    pub async fn toggle(&self) -> PodStatus {
        let mut status = self.status.write().await;
        let previous = *status;
        *status = previous.toggled();
        info!(from = %previous, to = %*status, "Changing status");
        *status
    }

    /// Push the current status; failures are logged only
    pub async fn push_current(&self) {
        let status = *self.status.read().await;
        self.push(status).await;
    }

    /// Mark the pod terminated and tell the controller
    pub async fn terminate(&self) {
        *self.status.write().await = PodStatus::Terminated;
        self.push(PodStatus::Terminated).await;
    }

    async fn push(&self, status: PodStatus) {
        let report = StatusReport::new(&self.name, status);
        match self.client.push(&report).await {
            Ok(()) => info!(pod = %self.name, status = %status, "Status pushed"),
            Err(e) => warn!(
                pod = %self.name,
                status = %status,
                endpoint = %self.client.endpoint(),
                error = %e,
                "Failed to push status"
            ),
        }
    }
}

async fn get_status(State(state): State<PodState>) -> Json<PodView> {
    Json(state.view().await)
}

async fn toggle_status(State(state): State<PodState>) -> Json<PodView> {
    state.toggle().await;
    state.push_current().await;
    Json(state.view().await)
}

pub fn create_router(state: PodState) -> Router {
    Router::new()
        .route("/get", get(get_status))
        .route("/toggle", post(toggle_status))
        .with_state(state)
}

/// Start the pod-local server
pub async fn serve(port: u16, state: PodState) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting status server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

/// Re-push the current status every `period`, first push after one period
pub async fn report_loop(state: PodState, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        state.push_current().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state(url: &str) -> PodState {
        PodState::new("fleet-1a2b3c4d", StatusClient::new(url).unwrap())
    }

    async fn body_view(response: axum::response::Response) -> PodView {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_name_and_status() {
        let app = create_router(state("http://127.0.0.1:9"));

        let response = app
            .oneshot(Request::builder().uri("/get").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "fleet-1a2b3c4d");
        assert_eq!(json["status"], "ready");
    }

    #[tokio::test]
    async fn test_toggle_flips_and_pushes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/statuss")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "Name": "fleet-1a2b3c4d",
                "Status": "occupied"
            })))
            .with_status(200)
            .create_async()
            .await;

        let app = create_router(state(&server.url()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/toggle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_view(response).await.status, PodStatus::Occupied);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_toggle_survives_unreachable_controller() {
        let pod = state("http://127.0.0.1:9");
        let app = create_router(pod.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/toggle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(pod.view().await.status, PodStatus::Occupied);
    }

    #[tokio::test]
    async fn test_toggle_twice_returns_to_ready() {
        let pod = state("http://127.0.0.1:9");
        assert_eq!(pod.toggle().await, PodStatus::Occupied);
        assert_eq!(pod.toggle().await, PodStatus::Ready);
    }

    #[tokio::test]
    async fn test_terminate_pushes_terminated() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/statuss")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "Name": "fleet-1a2b3c4d",
                "Status": "terminated"
            })))
            .with_status(200)
            .create_async()
            .await;

        let pod = state(&server.url());
        pod.terminate().await;

        assert_eq!(pod.view().await.status, PodStatus::Terminated);
        mock.assert_async().await;
    }
}
