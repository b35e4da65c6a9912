//! Notification fan-out for alert edges

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::config::{AlertDefinition, Severity, Transition};
use crate::model::MetricSnapshot;

/// Rendered notification handed to every channel
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub alert: String,
    pub severity: Severity,
    pub transition: Transition,
    pub condition: String,
    /// Human-readable message
    pub message: String,
    /// Creation time (unix millis)
    pub timestamp: i64,
}

/// A notification delivery channel (email, chat, webhook, pager, ...)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}

struct ChannelSlot {
    channel: Arc<dyn NotificationChannel>,
    enabled: bool,
}

/// Delivery counts for one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

enum Delivery {
    Delivered,
    Failed,
    Skipped,
}

/// Sends alert notifications to named channels.
///
/// Each channel is invoked independently; a failing channel is logged and
/// never affects the others or the caller.
#[derive(Default)]
pub struct NotificationDispatcher {
    channels: HashMap<String, ChannelSlot>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under `name`, replacing any previous one
    pub fn register(
        &mut self,
        name: impl Into<String>,
        channel: Arc<dyn NotificationChannel>,
        enabled: bool,
    ) {
        let name = name.into();
        if self
            .channels
            .insert(name.clone(), ChannelSlot { channel, enabled })
            .is_some()
        {
            tracing::warn!(channel = %name, "Notification channel registered twice; keeping the latest");
        }
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver a notification for `transition` to all of the alert's channels.
    ///
    /// Sends run concurrently and are all awaited before returning.
    pub async fn dispatch(
        &self,
        alert: &AlertDefinition,
        transition: Transition,
        snapshot: &MetricSnapshot,
    ) -> DispatchReport {
        let notification = Notification {
            alert: alert.name.clone(),
            severity: alert.severity,
            transition,
            condition: alert.condition.clone(),
            message: format_message(alert, transition, snapshot),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let sends = alert
            .channels
            .iter()
            .map(|name| self.deliver(name, &notification));

        let mut report = DispatchReport::default();
        for outcome in join_all(sends).await {
            match outcome {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Failed => report.failed += 1,
                Delivery::Skipped => report.skipped += 1,
            }
        }
        report
    }

    async fn deliver(&self, name: &str, notification: &Notification) -> Delivery {
        let Some(slot) = self.channels.get(name) else {
            tracing::warn!(
                alert = %notification.alert,
                channel = %name,
                "Alert references unknown notification channel"
            );
            return Delivery::Failed;
        };

        if !slot.enabled {
            return Delivery::Skipped;
        }

        match slot.channel.send(notification).await {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                tracing::error!(
                    alert = %notification.alert,
                    channel = %name,
                    error = %e,
                    "Failed to send notification"
                );
                Delivery::Failed
            }
        }
    }
}

/// Render the message text for an alert edge
pub fn format_message(
    alert: &AlertDefinition,
    transition: Transition,
    snapshot: &MetricSnapshot,
) -> String {
    let verb = match transition {
        Transition::Resolved => "resolved",
        Transition::Triggered | Transition::Unchanged => "triggered",
    };
    format!(
        "[{}] Alert '{}' {}: {} | {}",
        alert.severity,
        alert.name,
        verb,
        alert.condition,
        snapshot.summary()
    )
}

// ============================================================================
// Built-in channels
// ============================================================================

/// Writes notifications to the log
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        tracing::warn!(
            alert = %notification.alert,
            severity = %notification.severity,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Posts notifications as JSON to an HTTP endpoint
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookChannel {
    /// Requests that have not completed within `timeout` fail the delivery
    pub fn new(
        url: impl Into<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Webhook(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            headers,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let payload = serde_json::json!({
            "alert": notification.alert,
            "severity": notification.severity,
            "status": notification.transition,
            "condition": notification.condition,
            "message": notification.message,
            "timestamp": notification.timestamp,
        });

        let mut request = self.client.post(&self.url).json(&payload);

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChannelError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            alert = %notification.alert,
            url = %self.url,
            "Webhook notification sent"
        );

        Ok(())
    }
}

/// Channel delivery errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}
