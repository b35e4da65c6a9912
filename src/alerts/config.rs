//! Alert definition and state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Alert definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDefinition {
    /// Unique alert name
    pub name: String,
    /// Condition over metric fields, e.g. `errorRate > 5 && availability < 99`
    pub condition: String,
    pub severity: Severity,
    /// Names of the notification channels to deliver to
    #[serde(default)]
    pub channels: Vec<String>,
    /// Suppression window after each trigger; falls back to the global cooldown
    #[serde(default)]
    pub cooldown_secs: Option<u64>,
}

impl AlertDefinition {
    /// Create a new alert definition
    pub fn new(name: impl Into<String>, condition: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            severity,
            channels: Vec::new(),
            cooldown_secs: None,
        }
    }

    /// Add a notification channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Set the suppression window applied after each trigger
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_secs = Some(cooldown.as_secs());
        self
    }
}

/// Current state of an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub enabled: bool,
    /// Whether the alert is currently firing
    pub triggered: bool,
    /// Last idle→triggered edge (unix millis)
    pub last_triggered: Option<i64>,
    /// Triggers are withheld until this time (unix millis)
    pub suppressed_until: Option<i64>,
    /// Number of idle→triggered edges; never decreases
    pub trigger_count: u64,
    /// Last evaluation error
    pub last_error: Option<String>,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            enabled: true,
            triggered: false,
            last_triggered: None,
            suppressed_until: None,
            trigger_count: 0,
            last_error: None,
        }
    }
}

/// Edge produced by one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Triggered,
    Resolved,
    Unchanged,
}

impl AlertState {
    pub fn is_suppressed(&self, now_ms: i64) -> bool {
        self.suppressed_until.map(|until| now_ms < until).unwrap_or(false)
    }

    /// Apply one evaluation result.
    ///
    /// A suppressed idle alert stays idle even if its condition holds. On a
    /// trigger edge the cooldown, when non-zero, opens a new suppression
    /// window.
    pub fn apply(&mut self, condition_met: bool, now_ms: i64, cooldown_ms: i64) -> Transition {
        match (self.triggered, condition_met) {
            (false, true) => {
                if self.is_suppressed(now_ms) {
                    return Transition::Unchanged;
                }
                self.triggered = true;
                self.last_triggered = Some(now_ms);
                self.trigger_count += 1;
                if cooldown_ms > 0 {
                    self.suppressed_until = Some(now_ms.saturating_add(cooldown_ms));
                }
                Transition::Triggered
            }
            (true, false) => {
                self.triggered = false;
                Transition::Resolved
            }
            (true, true) | (false, false) => Transition::Unchanged,
        }
    }
}
