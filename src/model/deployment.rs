//! Deployment records

use serde::{Deserialize, Serialize};

use super::snapshot::MetricSnapshot;
use crate::alerts::Severity;

/// Lifecycle status of a tracked deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    Completed,
    Failed,
    RolledBack,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Active)
    }
}

/// A tracked release instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: String,
    pub version: String,
    /// Tracking start (unix millis)
    pub start_time: i64,
    /// Tracking end (unix millis), set when the deployment leaves the active set
    pub end_time: Option<i64>,
    pub status: DeploymentStatus,
    /// Most recent snapshot
    pub current: MetricSnapshot,
    /// Snapshot captured when tracking started
    pub baseline: Option<MetricSnapshot>,
    /// Alerts that fired while this deployment was active, oldest first
    pub alerts: Vec<AlertEvent>,
    /// Baseline validation outcomes, oldest first
    pub health_checks: Vec<HealthCheckResult>,
    /// Feature flag changes observed while active, oldest first
    pub flag_changes: Vec<FeatureFlagEvent>,
}

impl Deployment {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        baseline: MetricSnapshot,
        now_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            start_time: now_ms,
            end_time: None,
            status: DeploymentStatus::Active,
            current: baseline.clone(),
            baseline: Some(baseline),
            alerts: Vec::new(),
            health_checks: Vec::new(),
            flag_changes: Vec::new(),
        }
    }

    /// Move into a terminal status and stamp the end time
    pub fn finish(&mut self, status: DeploymentStatus, now_ms: i64) {
        self.status = status;
        self.end_time = Some(now_ms);
    }
}

/// An alert that fired while a deployment was being tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert: String,
    pub severity: Severity,
    pub message: String,
    /// Trigger time (unix millis)
    pub triggered_at: i64,
}

/// Outcome of one baseline validation for a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Check time (unix millis)
    pub checked_at: i64,
    pub passed: bool,
    /// Diagnostic for a failed check
    pub violation: Option<String>,
}

/// A feature flag change to correlate with deployment health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlagEvent {
    pub flag: String,
    #[serde(default)]
    pub previous: Option<serde_json::Value>,
    pub current: serde_json::Value,
    /// Change time (unix millis); stamped on receipt when absent
    #[serde(default)]
    pub timestamp: Option<i64>,
}
