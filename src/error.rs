//! Errors surfaced to callers of the monitor

use crate::baseline::BaselineViolation;
use crate::config::ConfigError;
use crate::source::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Deployment already tracked: {0}")]
    DuplicateDeployment(String),

    #[error("Deployment not found: {0}")]
    NotFound(String),

    #[error("Baseline violation in deployment {deployment_id}: {violation}")]
    BaselineViolation {
        deployment_id: String,
        #[source]
        violation: BaselineViolation,
    },

    #[error("Alert already registered: {0}")]
    DuplicateAlert(String),

    #[error("Alert not found: {0}")]
    UnknownAlert(String),

    #[error("Metrics fetch failed: {0}")]
    MetricsFetch(#[from] FetchError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
