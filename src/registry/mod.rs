//! Registry of tracked deployments
//!
//! Deployments are keyed by id and iterated in insertion order. Each one owns
//! a bounded history of the snapshots recorded while it was active.

use std::collections::HashMap;

use crate::error::MonitorError;
use crate::history::{MetricDataPoint, RingBuffer};
use crate::model::{
    AlertEvent, Deployment, DeploymentStatus, FeatureFlagEvent, HealthCheckResult, MetricSnapshot,
};

struct TrackedDeployment {
    deployment: Deployment,
    history: RingBuffer<MetricDataPoint>,
}

/// Active deployments and their metric history
pub struct DeploymentRegistry {
    entries: HashMap<String, TrackedDeployment>,
    /// Insertion order of the ids in `entries`
    order: Vec<String>,
    history_capacity: usize,
}

impl DeploymentRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            history_capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Begin tracking a deployment with `baseline` as its reference snapshot
    pub fn start(
        &mut self,
        id: &str,
        version: &str,
        baseline: MetricSnapshot,
        now_ms: i64,
    ) -> Result<&Deployment, MonitorError> {
        if self.contains(id) {
            return Err(MonitorError::DuplicateDeployment(id.to_string()));
        }

        let deployment = Deployment::new(id, version, baseline, now_ms);
        let mut history = RingBuffer::new(self.history_capacity);
        history.push(MetricDataPoint {
            timestamp: now_ms,
            snapshot: deployment.current.clone(),
            deployment_id: id.to_string(),
        });

        self.order.push(id.to_string());
        let tracked = self
            .entries
            .entry(id.to_string())
            .or_insert(TrackedDeployment {
                deployment,
                history,
            });
        Ok(&tracked.deployment)
    }

    pub fn get(&self, id: &str) -> Result<&Deployment, MonitorError> {
        self.entries
            .get(id)
            .map(|t| &t.deployment)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    /// Latest snapshot for a deployment
    pub fn current(&self, id: &str) -> Result<&MetricSnapshot, MonitorError> {
        self.get(id).map(|d| &d.current)
    }

    /// Recorded history, oldest first
    pub fn history(&self, id: &str) -> Result<Vec<MetricDataPoint>, MonitorError> {
        self.entries
            .get(id)
            .map(|t| t.history.iter().cloned().collect())
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    /// The newest `limit` history points, oldest first
    pub fn recent_history(&self, id: &str, limit: usize) -> Result<Vec<MetricDataPoint>, MonitorError> {
        self.entries
            .get(id)
            .map(|t| t.history.recent(limit).cloned().collect())
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    /// Active deployments in insertion order
    pub fn list_active(&self) -> Vec<&Deployment> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|t| &t.deployment)
            .collect()
    }

    /// Baselines of all active deployments, in insertion order
    pub fn baselines(&self) -> Vec<&MetricSnapshot> {
        self.list_active()
            .into_iter()
            .filter_map(|d| d.baseline.as_ref())
            .collect()
    }

    /// Remove a deployment from the active set, moving it to `status`
    pub fn stop(
        &mut self,
        id: &str,
        status: DeploymentStatus,
        now_ms: i64,
    ) -> Result<Deployment, MonitorError> {
        let mut tracked = self
            .entries
            .remove(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        self.order.retain(|existing| existing != id);

        tracked.deployment.finish(status, now_ms);
        Ok(tracked.deployment)
    }

    /// Remove every deployment, in insertion order
    pub fn drain(&mut self, status: DeploymentStatus, now_ms: i64) -> Vec<Deployment> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|mut tracked| {
                tracked.deployment.finish(status, now_ms);
                tracked.deployment
            })
            .collect()
    }

    /// Record a new snapshot for every active deployment. Returns the number
    /// of deployments updated.
    pub fn record_snapshot(&mut self, snapshot: &MetricSnapshot, now_ms: i64) -> usize {
        for tracked in self.entries.values_mut() {
            tracked.deployment.current = snapshot.clone();
            tracked.history.push(MetricDataPoint {
                timestamp: now_ms,
                snapshot: snapshot.clone(),
                deployment_id: tracked.deployment.id.clone(),
            });
        }
        self.entries.len()
    }

    /// Attach an alert event to every active deployment
    pub fn record_alert(&mut self, event: &AlertEvent) {
        for tracked in self.entries.values_mut() {
            tracked.deployment.alerts.push(event.clone());
        }
    }

    pub fn record_health_check(
        &mut self,
        id: &str,
        result: HealthCheckResult,
    ) -> Result<(), MonitorError> {
        let tracked = self
            .entries
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        tracked.deployment.health_checks.push(result);
        Ok(())
    }

    /// Attach a feature flag change to every active deployment. Returns the
    /// number of deployments annotated.
    pub fn record_flag_change(&mut self, event: &FeatureFlagEvent) -> usize {
        for tracked in self.entries.values_mut() {
            tracked.deployment.flag_changes.push(event.clone());
        }
        self.entries.len()
    }
}

impl Default for DeploymentRegistry {
    fn default() -> Self {
        Self::new(crate::history::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;

    fn snapshot(error_rate: f64) -> MetricSnapshot {
        MetricSnapshot {
            error_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_and_get() {
        let mut registry = DeploymentRegistry::default();
        registry.start("web-1", "1.0.0", snapshot(0.5), 1_000).unwrap();

        let deployment = registry.get("web-1").unwrap();
        assert_eq!(deployment.version, "1.0.0");
        assert_eq!(deployment.status, DeploymentStatus::Active);
        assert_eq!(registry.current("web-1").unwrap().error_rate, 0.5);
        assert_eq!(registry.history("web-1").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_start_rejected() {
        let mut registry = DeploymentRegistry::default();
        registry.start("web-1", "1.0.0", snapshot(0.5), 1_000).unwrap();

        let err = registry.start("web-1", "1.0.1", snapshot(0.7), 2_000).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateDeployment(id) if id == "web-1"));
        // The original is untouched
        assert_eq!(registry.get("web-1").unwrap().version, "1.0.0");
    }

    #[test]
    fn test_stop_removes_and_finishes() {
        let mut registry = DeploymentRegistry::default();
        registry.start("web-1", "1.0.0", snapshot(0.5), 1_000).unwrap();

        let stopped = registry.stop("web-1", DeploymentStatus::Completed, 9_000).unwrap();
        assert_eq!(stopped.status, DeploymentStatus::Completed);
        assert_eq!(stopped.end_time, Some(9_000));

        assert!(matches!(registry.get("web-1"), Err(MonitorError::NotFound(_))));
        assert!(matches!(registry.history("web-1"), Err(MonitorError::NotFound(_))));
        assert!(matches!(
            registry.stop("web-1", DeploymentStatus::Completed, 9_500),
            Err(MonitorError::NotFound(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_active_in_insertion_order() {
        let mut registry = DeploymentRegistry::default();
        for id in ["zeta", "alpha", "mid"] {
            registry.start(id, "1.0.0", snapshot(0.0), 0).unwrap();
        }
        registry.stop("alpha", DeploymentStatus::Failed, 1).unwrap();
        registry.start("beta", "1.0.0", snapshot(0.0), 2).unwrap();

        let ids: Vec<&str> = registry.list_active().into_iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "mid", "beta"]);
    }

    #[test]
    fn test_record_snapshot_keeps_baseline_and_caps_history() {
        let mut registry = DeploymentRegistry::new(5);
        registry.start("web-1", "1.0.0", snapshot(1.0), 0).unwrap();

        for tick in 1..=12 {
            registry.record_snapshot(&snapshot(tick as f64), tick * 1_000);
        }

        let deployment = registry.get("web-1").unwrap();
        assert_eq!(deployment.current.error_rate, 12.0);
        assert_eq!(deployment.baseline.as_ref().unwrap().error_rate, 1.0);

        let history = registry.history("web-1").unwrap();
        assert_eq!(history.len(), 5);
        let timestamps: Vec<i64> = history.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![8_000, 9_000, 10_000, 11_000, 12_000]);
        assert!(history.iter().all(|p| p.deployment_id == "web-1"));

        let recent = registry.recent_history("web-1", 2).unwrap();
        let timestamps: Vec<i64> = recent.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![11_000, 12_000]);
        assert_eq!(registry.recent_history("web-1", 50).unwrap().len(), 5);
        assert!(matches!(
            registry.recent_history("web-9", 2),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn test_annotations_reach_every_active_deployment() {
        let mut registry = DeploymentRegistry::default();
        registry.start("web-1", "1.0.0", snapshot(0.0), 0).unwrap();
        registry.start("web-2", "2.0.0", snapshot(0.0), 0).unwrap();

        registry.record_alert(&AlertEvent {
            alert: "errors".into(),
            severity: Severity::High,
            message: "boom".into(),
            triggered_at: 10,
        });
        let annotated = registry.record_flag_change(&FeatureFlagEvent {
            flag: "new-checkout".into(),
            previous: Some(serde_json::json!(false)),
            current: serde_json::json!(true),
            timestamp: Some(20),
        });

        assert_eq!(annotated, 2);
        for d in registry.list_active() {
            assert_eq!(d.alerts.len(), 1);
            assert_eq!(d.flag_changes.len(), 1);
        }
    }

    #[test]
    fn test_drain_in_order() {
        let mut registry = DeploymentRegistry::default();
        registry.start("b", "1", snapshot(0.0), 0).unwrap();
        registry.start("a", "1", snapshot(0.0), 0).unwrap();

        let drained = registry.drain(DeploymentStatus::Completed, 50);
        let ids: Vec<&str> = drained.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(drained.iter().all(|d| d.end_time == Some(50)));
        assert!(registry.is_empty());
    }
}
