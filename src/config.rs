//! Monitor configuration
//!
//! Loaded from a JSON file, then overridden from `PERISCOPE_*` environment
//! variables. Every field has a default, so an empty object is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::alerts::AlertDefinition;
use crate::baseline::DEFAULT_TOLERANCE;
use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Start the poll loop on initialization
    pub enabled: bool,
    /// Seconds between polls
    pub poll_interval_secs: u64,
    /// Points retained per deployment
    pub history_capacity: usize,
    /// Fractional deviation allowed from a baseline
    pub baseline_tolerance: f64,
    /// Observability providers receiving each raw snapshot
    pub providers: Vec<ProviderConfig>,
    /// Custom metric names to track; empty keeps all
    pub custom_metrics: Vec<String>,
    pub channels: Vec<ChannelConfig>,
    pub alerts: Vec<AlertDefinition>,
    /// Suppression window after each trigger, unless the alert sets its own
    pub alert_cooldown_secs: u64,
    /// Also notify channels when an alert resolves
    pub notify_on_resolve: bool,
    /// Dashboard definitions, passed through untouched
    pub dashboards: Vec<serde_json::Value>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 30,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            baseline_tolerance: DEFAULT_TOLERANCE,
            providers: Vec::new(),
            custom_metrics: Vec::new(),
            channels: Vec::new(),
            alerts: Vec::new(),
            alert_cooldown_secs: 0,
            notify_on_resolve: false,
            dashboards: Vec::new(),
        }
    }
}

/// An observability provider entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider-specific settings
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// A named notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelKind {
    /// Log to tracing
    Log,
    /// HTTP webhook
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        /// Per-request timeout
        #[serde(default = "default_webhook_timeout_secs")]
        timeout_secs: u64,
    },
    /// Adapter supplied by the embedding application
    External,
}

fn default_true() -> bool {
    true
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl MonitorConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: MonitorConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`:
    /// - `PERISCOPE_ENABLED`
    /// - `PERISCOPE_POLL_INTERVAL_SECS`
    /// - `PERISCOPE_HISTORY_CAPACITY`
    /// - `PERISCOPE_BASELINE_TOLERANCE`
    /// - `PERISCOPE_NOTIFY_ON_RESOLVE`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PERISCOPE_ENABLED") {
            self.enabled = parse_env("PERISCOPE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PERISCOPE_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_env("PERISCOPE_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("PERISCOPE_HISTORY_CAPACITY") {
            self.history_capacity = parse_env("PERISCOPE_HISTORY_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("PERISCOPE_BASELINE_TOLERANCE") {
            self.baseline_tolerance = parse_env("PERISCOPE_BASELINE_TOLERANCE", &v)?;
        }
        if let Some(v) = lookup("PERISCOPE_NOTIFY_ON_RESOLVE") {
            self.notify_on_resolve = parse_env("PERISCOPE_NOTIFY_ON_RESOLVE", &v)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be at least 1".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be at least 1".into()));
        }
        if !self.baseline_tolerance.is_finite()
            || !(0.0..1.0).contains(&self.baseline_tolerance)
        {
            return Err(ConfigError::Invalid(format!(
                "baseline_tolerance must be in [0, 1), got {}",
                self.baseline_tolerance
            )));
        }
        for channel in &self.channels {
            if let ChannelKind::Webhook { timeout_secs: 0, .. } = channel.kind {
                return Err(ConfigError::Invalid(format!(
                    "channel '{}': timeout_secs must be at least 1",
                    channel.name
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Add an alert definition
    pub fn with_alert(mut self, alert: AlertDefinition) -> Self {
        self.alerts.push(alert);
        self
    }

    /// Set whether the poll loop starts on initialization
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {key}")]
    Env { key: String, value: String },

    #[error("{0}")]
    Invalid(String),
}
