//! Metrics sources
//!
//! The monitor never generates metrics itself; every snapshot comes from a
//! [`MetricsSource`]. Production wires in [`HttpMetricsSource`], tests inject
//! deterministic fixtures.

pub mod http;

use async_trait::async_trait;

use crate::model::MetricSnapshot;

pub use http::HttpMetricsSource;

/// Supplier of metric snapshots
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Read the current metrics. Failures are treated as transient.
    async fn fetch_snapshot(&self) -> Result<MetricSnapshot, FetchError>;
}

/// Metrics fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Metrics endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid snapshot payload: {0}")]
    Decode(String),

    #[error("Metrics source unavailable: {0}")]
    Unavailable(String),
}
