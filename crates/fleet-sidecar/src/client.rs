//! Client pushing pod status to the fleet controller

use anyhow::{Context, Result};
use fleet_lib::{ingest::STATUS_PATH, StatusReport};
use reqwest::Client;
use url::Url;

/// HTTP client for the controller's ingestion endpoint
pub struct StatusClient {
    client: Client,
    endpoint: Url,
}

impl StatusClient {
    /// Create a client for the controller at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid controller URL")?;
        let endpoint = base_url.join(STATUS_PATH).context("Invalid status path")?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one status report
    pub async fn push(&self, report: &StatusReport) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(report)
            .send()
            .await
            .context("Failed to send status")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Controller rejected status ({}): {}", status, body);
        }

        Ok(())
    }
}
