//! HTTP metrics source

use async_trait::async_trait;
use std::time::Duration;

use super::{FetchError, MetricsSource};
use crate::model::MetricSnapshot;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads snapshots from an HTTP endpoint returning snapshot JSON
pub struct HttpMetricsSource {
    client: reqwest::Client,
    url: String,
    custom_metrics: Vec<String>,
}

impl HttpMetricsSource {
    /// Create a source polling `url` with the default request timeout
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a source whose requests give up after `timeout`
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            custom_metrics: Vec::new(),
        })
    }

    /// Ask the endpoint for these custom metrics as well
    pub fn with_custom_metrics(mut self, names: Vec<String>) -> Self {
        self.custom_metrics = names;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch_snapshot(&self) -> Result<MetricSnapshot, FetchError> {
        let mut request = self.client.get(&self.url);
        if !self.custom_metrics.is_empty() {
            request = request.query(&[("custom", self.custom_metrics.join(","))]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let snapshot = response
            .json::<MetricSnapshot>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(url = %self.url, "Fetched metrics snapshot");

        Ok(snapshot)
    }
}
