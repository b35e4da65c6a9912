//! Alert evaluation and trigger/resolve state machine

use serde::Serialize;
use std::time::Duration;

use super::config::{AlertDefinition, AlertState, Transition};
use super::expr::{Expr, ExprError};
use crate::error::MonitorError;
use crate::model::MetricSnapshot;

struct RegisteredAlert {
    definition: AlertDefinition,
    /// Parsed once at registration; a parse failure is kept and reported on
    /// every evaluation
    condition: Result<Expr, ExprError>,
    state: AlertState,
}

/// An edge produced by an evaluation pass
#[derive(Debug, Clone)]
pub struct AlertTransition {
    pub definition: AlertDefinition,
    pub transition: Transition,
    /// State after the transition
    pub state: AlertState,
}

/// Read-only view of a registered alert
#[derive(Debug, Clone, Serialize)]
pub struct AlertSummary {
    pub definition: AlertDefinition,
    pub state: AlertState,
    /// Metric paths the condition reads
    pub fields: Vec<String>,
    /// Set when the condition failed to parse
    pub condition_error: Option<String>,
}

/// Owns all alert definitions and their state
pub struct AlertEngine {
    /// Registration order is evaluation order
    alerts: Vec<RegisteredAlert>,
    default_cooldown: Duration,
}

impl AlertEngine {
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            alerts: Vec::new(),
            default_cooldown,
        }
    }

    /// Register an alert. Only a duplicate name is rejected; a malformed
    /// condition is stored and evaluates as not triggered.
    pub fn register(&mut self, definition: AlertDefinition) -> Result<(), MonitorError> {
        if self.find(&definition.name).is_some() {
            return Err(MonitorError::DuplicateAlert(definition.name));
        }

        let condition = Expr::parse(&definition.condition);
        if let Err(ref e) = condition {
            tracing::warn!(
                alert = %definition.name,
                condition = %definition.condition,
                error = %e,
                "Alert condition is malformed; it will never trigger"
            );
        }

        self.alerts.push(RegisteredAlert {
            definition,
            condition,
            state: AlertState::default(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn state(&self, name: &str) -> Option<&AlertState> {
        self.find(name).map(|i| &self.alerts[i].state)
    }

    pub fn summaries(&self) -> Vec<AlertSummary> {
        self.alerts
            .iter()
            .map(|a| AlertSummary {
                definition: a.definition.clone(),
                state: a.state.clone(),
                fields: a
                    .condition
                    .as_ref()
                    .map(|expr| expr.fields().into_iter().map(String::from).collect())
                    .unwrap_or_default(),
                condition_error: a.condition.as_ref().err().map(|e| e.to_string()),
            })
            .collect()
    }

    /// Enable or disable an alert. Disabling clears the triggered flag.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), MonitorError> {
        let alert = self.get_mut(name)?;
        alert.state.enabled = enabled;
        if !enabled {
            alert.state.triggered = false;
        }
        Ok(())
    }

    /// Withhold triggers until `until_ms`, or lift suppression with `None`
    pub fn suppress(&mut self, name: &str, until_ms: Option<i64>) -> Result<(), MonitorError> {
        self.get_mut(name)?.state.suppressed_until = until_ms;
        Ok(())
    }

    /// Evaluate every enabled alert against `snapshot`.
    ///
    /// Returns the trigger and resolve edges in registration order. An alert
    /// whose condition cannot be evaluated counts as not met for this pass.
    pub fn evaluate(&mut self, snapshot: &MetricSnapshot, now_ms: i64) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();

        for alert in self.alerts.iter_mut().filter(|a| a.state.enabled) {
            let outcome = match &alert.condition {
                Ok(expr) => expr.evaluate(snapshot),
                Err(e) => Err(e.clone()),
            };

            let condition_met = match outcome {
                Ok(met) => {
                    alert.state.last_error = None;
                    met
                }
                Err(e) => {
                    tracing::warn!(
                        alert = %alert.definition.name,
                        error = %e,
                        "Alert condition evaluation failed"
                    );
                    alert.state.last_error = Some(e.to_string());
                    false
                }
            };

            let cooldown = alert
                .definition
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(self.default_cooldown);

            let cooldown_ms = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
            let transition = alert.state.apply(condition_met, now_ms, cooldown_ms);

            match transition {
                Transition::Triggered => {
                    tracing::info!(
                        alert = %alert.definition.name,
                        severity = %alert.definition.severity,
                        trigger_count = alert.state.trigger_count,
                        "Alert triggered"
                    );
                }
                Transition::Resolved => {
                    tracing::info!(alert = %alert.definition.name, "Alert resolved");
                }
                Transition::Unchanged => continue,
            }

            transitions.push(AlertTransition {
                definition: alert.definition.clone(),
                transition,
                state: alert.state.clone(),
            });
        }

        transitions
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.alerts.iter().position(|a| a.definition.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut RegisteredAlert, MonitorError> {
        self.alerts
            .iter_mut()
            .find(|a| a.definition.name == name)
            .ok_or_else(|| MonitorError::UnknownAlert(name.to_string()))
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;

    fn with_error_rate(error_rate: f64) -> MetricSnapshot {
        MetricSnapshot {
            error_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_trigger_resolve_retrigger_sequence() {
        let mut engine = AlertEngine::default();
        engine
            .register(AlertDefinition::new("errors", "errorRate > 5", Severity::High))
            .unwrap();

        let t1 = engine.evaluate(&with_error_rate(6.0), 1_000);
        assert_eq!(t1.len(), 1);
        assert_eq!(t1[0].transition, Transition::Triggered);
        assert_eq!(engine.state("errors").unwrap().trigger_count, 1);

        let t2 = engine.evaluate(&with_error_rate(4.0), 2_000);
        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].transition, Transition::Resolved);
        assert!(!engine.state("errors").unwrap().triggered);

        let t3 = engine.evaluate(&with_error_rate(7.0), 3_000);
        assert_eq!(t3[0].transition, Transition::Triggered);
        assert_eq!(engine.state("errors").unwrap().trigger_count, 2);
    }

    #[test]
    fn test_steady_state_produces_no_edges() {
        let mut engine = AlertEngine::default();
        engine
            .register(AlertDefinition::new("errors", "errorRate > 5", Severity::Low))
            .unwrap();

        assert!(engine.evaluate(&with_error_rate(1.0), 1_000).is_empty());
        assert_eq!(engine.evaluate(&with_error_rate(9.0), 2_000).len(), 1);
        assert!(engine.evaluate(&with_error_rate(9.5), 3_000).is_empty());
        assert_eq!(engine.state("errors").unwrap().trigger_count, 1);
    }

    #[test]
    fn test_malformed_condition_isolated() {
        let mut engine = AlertEngine::default();
        engine
            .register(AlertDefinition::new("broken", "errorRate >>> 5", Severity::Low))
            .unwrap();
        engine
            .register(AlertDefinition::new("missing", "custom.absent > 1", Severity::Low))
            .unwrap();
        engine
            .register(AlertDefinition::new("valid", "errorRate > 5", Severity::High))
            .unwrap();

        let transitions = engine.evaluate(&with_error_rate(6.0), 1_000);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].definition.name, "valid");

        assert!(engine.state("broken").unwrap().last_error.is_some());
        assert!(engine.state("missing").unwrap().last_error.is_some());

        let summaries = engine.summaries();
        assert!(summaries[0].condition_error.is_some());
        assert!(summaries[0].fields.is_empty());
        assert!(summaries[1].condition_error.is_none());
        assert_eq!(summaries[1].fields, vec!["custom.absent"]);
        assert_eq!(summaries[2].fields, vec!["errorRate"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut engine = AlertEngine::default();
        engine
            .register(AlertDefinition::new("errors", "errorRate > 5", Severity::Low))
            .unwrap();
        let err = engine
            .register(AlertDefinition::new("errors", "errorRate > 9", Severity::Low))
            .unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateAlert(name) if name == "errors"));
    }

    #[test]
    fn test_disabled_alert_skipped() {
        let mut engine = AlertEngine::default();
        engine
            .register(AlertDefinition::new("errors", "errorRate > 5", Severity::Low))
            .unwrap();
        engine.evaluate(&with_error_rate(6.0), 1_000);

        engine.set_enabled("errors", false).unwrap();
        assert!(!engine.state("errors").unwrap().triggered);
        assert!(engine.evaluate(&with_error_rate(8.0), 2_000).is_empty());
        assert_eq!(engine.state("errors").unwrap().trigger_count, 1);

        assert!(matches!(
            engine.set_enabled("nope", true),
            Err(MonitorError::UnknownAlert(_))
        ));
    }

    #[test]
    fn test_default_cooldown_and_manual_suppression() {
        let mut engine = AlertEngine::new(Duration::from_secs(60));
        engine
            .register(AlertDefinition::new("errors", "errorRate > 5", Severity::Low))
            .unwrap();
        engine
            .register(
                AlertDefinition::new("no-cooldown", "errorRate > 5", Severity::Low)
                    .with_cooldown(Duration::ZERO),
            )
            .unwrap();

        engine.evaluate(&with_error_rate(6.0), 0);
        engine.evaluate(&with_error_rate(1.0), 1_000);
        let retrigger = engine.evaluate(&with_error_rate(6.0), 2_000);

        // Only the alert without a cooldown fires again inside the window
        assert_eq!(retrigger.len(), 1);
        assert_eq!(retrigger[0].definition.name, "no-cooldown");

        engine.suppress("no-cooldown", Some(100_000)).unwrap();
        engine.evaluate(&with_error_rate(1.0), 3_000);
        assert!(engine.evaluate(&with_error_rate(6.0), 4_000).is_empty());

        engine.suppress("no-cooldown", None).unwrap();
        assert_eq!(engine.evaluate(&with_error_rate(6.0), 5_000).len(), 1);
    }
    #[test]
    fn test_huge_cooldown_suppresses_without_wrapping() {
        for secs in [10u64.pow(16), 9_223_372_036_854_775, u64::MAX] {
            let mut engine = AlertEngine::default();
            engine
                .register(
                    AlertDefinition::new("errors", "errorRate > 5", Severity::Low)
                        .with_cooldown(Duration::from_secs(secs)),
                )
                .unwrap();

            let now = 1_700_000_000_000;
            assert_eq!(engine.evaluate(&with_error_rate(6.0), now).len(), 1);
            let until = engine.state("errors").unwrap().suppressed_until.unwrap();
            assert!(until > now, "cooldown of {}s ended in the past", secs);

            engine.evaluate(&with_error_rate(1.0), now + 1_000);
            assert!(engine.evaluate(&with_error_rate(6.0), now + 2_000).is_empty());
            assert_eq!(engine.state("errors").unwrap().trigger_count, 1);
        }
    }
}
