//! Deployment monitor
//!
//! [`DeploymentMonitor`] is the explicit context object owning the registry,
//! alert engine, notification dispatcher and poll loop. It is built from a
//! [`MonitorConfig`] plus the external capabilities (metrics source, archive,
//! channels, observers) via [`MonitorBuilder`].
//!
//! Registry and alert state live behind `parking_lot` mutexes that are never
//! held across an await. Ticks are serialized by an async lock, so a manual
//! [`DeploymentMonitor::tick`] can never overlap a scheduled one.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::alerts::notifier::format_message;
use crate::alerts::{
    AlertEngine, AlertSummary, DispatchReport, LogChannel, NotificationChannel,
    NotificationDispatcher, Transition, WebhookChannel,
};
use crate::archive::{ArchivalSink, LogArchive};
use crate::baseline::{BaselineValidator, BaselineViolation};
use crate::config::{ChannelKind, ConfigError, MonitorConfig};
use crate::error::MonitorError;
use crate::history::MetricDataPoint;
use crate::model::{
    AlertEvent, Deployment, DeploymentStatus, FeatureFlagEvent, HealthCheckResult, MetricSnapshot,
};
use crate::registry::DeploymentRegistry;
use crate::scheduler::Scheduler;
use crate::source::MetricsSource;

/// Receives every raw snapshot fetched by a tick
pub trait MetricsObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &MetricSnapshot);
}

/// Observer for provider type `log`
pub struct LogObserver;

impl MetricsObserver for LogObserver {
    fn on_snapshot(&self, snapshot: &MetricSnapshot) {
        tracing::debug!(custom = snapshot.custom.len(), "Metrics: {}", snapshot.summary());
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// False when the metrics fetch failed and the tick was skipped
    pub fetched: bool,
    pub deployments_updated: usize,
    pub triggered: Vec<String>,
    pub resolved: Vec<String>,
    pub notifications: DispatchReport,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// State shared between the monitor handle and the poll task
struct Shared {
    source: Arc<dyn MetricsSource>,
    archive: Arc<dyn ArchivalSink>,
    registry: Mutex<DeploymentRegistry>,
    engine: Mutex<AlertEngine>,
    dispatcher: NotificationDispatcher,
    observers: Vec<Arc<dyn MetricsObserver>>,
    validator: BaselineValidator,
    custom_metrics: Vec<String>,
    notify_on_resolve: bool,
    tick_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    /// Fetch a snapshot, keeping only the tracked custom metrics
    async fn fetch(&self) -> Result<MetricSnapshot, MonitorError> {
        let mut snapshot = self.source.fetch_snapshot().await?;
        self.filter_custom(&mut snapshot);
        Ok(snapshot)
    }

    fn filter_custom(&self, snapshot: &mut MetricSnapshot) {
        if !self.custom_metrics.is_empty() {
            snapshot.retain_custom(&self.custom_metrics);
        }
    }

    async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let mut report = TickReport::default();

        let raw = match self.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Metrics fetch failed; skipping tick");
                return report;
            }
        };
        report.fetched = true;

        let mut snapshot = raw.clone();
        self.filter_custom(&mut snapshot);
        let now = now_ms();

        report.deployments_updated = self.registry.lock().record_snapshot(&snapshot, now);
        let transitions = self.engine.lock().evaluate(&snapshot, now);

        for edge in transitions {
            let name = edge.definition.name.clone();
            match edge.transition {
                Transition::Triggered => {
                    let event = AlertEvent {
                        alert: name.clone(),
                        severity: edge.definition.severity,
                        message: format_message(&edge.definition, edge.transition, &snapshot),
                        triggered_at: now,
                    };
                    self.registry.lock().record_alert(&event);
                    report.triggered.push(name);

                    let delivery = self
                        .dispatcher
                        .dispatch(&edge.definition, edge.transition, &snapshot)
                        .await;
                    report.notifications.merge(delivery);
                }
                Transition::Resolved => {
                    report.resolved.push(name);
                    if self.notify_on_resolve {
                        let delivery = self
                            .dispatcher
                            .dispatch(&edge.definition, edge.transition, &snapshot)
                            .await;
                        report.notifications.merge(delivery);
                    }
                }
                Transition::Unchanged => {}
            }
        }

        for observer in &self.observers {
            observer.on_snapshot(&raw);
        }

        tracing::debug!(
            deployments = report.deployments_updated,
            triggered = report.triggered.len(),
            resolved = report.resolved.len(),
            "Tick complete"
        );
        report
    }
}

/// Tracks live deployments, evaluates alerts and validates baselines
pub struct DeploymentMonitor {
    shared: Arc<Shared>,
    scheduler: tokio::sync::Mutex<Scheduler>,
    dashboards: Vec<serde_json::Value>,
    providers: Vec<String>,
}

impl DeploymentMonitor {
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    /// Start the poll loop. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let shared = Arc::clone(&self.shared);
        self.scheduler.lock().await.start(move || {
            let shared = Arc::clone(&shared);
            async move {
                shared.tick().await;
            }
        })
    }

    /// Stop the poll loop, waiting for an in-flight tick
    pub async fn stop(&self) {
        self.scheduler.lock().await.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    /// Period of the poll loop
    pub async fn poll_interval(&self) -> Duration {
        self.scheduler.lock().await.interval()
    }

    /// Run one tick now
    pub async fn tick(&self) -> TickReport {
        self.shared.tick().await
    }

    /// Begin tracking a deployment, capturing a fresh baseline snapshot
    pub async fn start_deployment_tracking(
        &self,
        id: &str,
        version: &str,
    ) -> Result<Deployment, MonitorError> {
        if self.shared.registry.lock().contains(id) {
            return Err(MonitorError::DuplicateDeployment(id.to_string()));
        }

        let baseline = self.shared.fetch().await?;
        let deployment = self
            .shared
            .registry
            .lock()
            .start(id, version, baseline, now_ms())?
            .clone();

        tracing::info!(
            deployment_id = %id,
            version = %version,
            "Started tracking deployment: {}",
            deployment.current.summary()
        );
        Ok(deployment)
    }

    /// Stop tracking a deployment as completed and archive it
    pub async fn stop_tracking(&self, id: &str) -> Result<Deployment, MonitorError> {
        self.stop_tracking_with_status(id, DeploymentStatus::Completed)
            .await
    }

    /// Stop tracking a deployment with the given outcome and archive it.
    ///
    /// A non-terminal status is recorded as completed. An archival failure is
    /// logged; the deployment is removed regardless.
    pub async fn stop_tracking_with_status(
        &self,
        id: &str,
        status: DeploymentStatus,
    ) -> Result<Deployment, MonitorError> {
        let status = if status.is_terminal() {
            status
        } else {
            DeploymentStatus::Completed
        };
        let deployment = self.shared.registry.lock().stop(id, status, now_ms())?;

        tracing::info!(deployment_id = %id, status = ?status, "Stopped tracking deployment");
        self.archive(&deployment).await;
        Ok(deployment)
    }

    async fn archive(&self, deployment: &Deployment) {
        if let Err(e) = self.shared.archive.archive(deployment).await {
            tracing::error!(
                deployment_id = %deployment.id,
                error = %e,
                "Failed to archive deployment"
            );
        }
    }

    /// Latest snapshot recorded for a deployment
    pub fn get_deployment_metrics(&self, id: &str) -> Result<MetricSnapshot, MonitorError> {
        self.shared.registry.lock().current(id).cloned()
    }

    pub fn deployment(&self, id: &str) -> Result<Deployment, MonitorError> {
        self.shared.registry.lock().get(id).cloned()
    }

    /// Active deployments in the order tracking started
    pub fn list_active(&self) -> Vec<Deployment> {
        self.shared
            .registry
            .lock()
            .list_active()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Recorded history for a deployment, oldest first
    pub fn history(&self, id: &str) -> Result<Vec<MetricDataPoint>, MonitorError> {
        self.shared.registry.lock().history(id)
    }

    /// The newest `limit` points of a deployment's history, oldest first
    pub fn recent_history(&self, id: &str, limit: usize) -> Result<Vec<MetricDataPoint>, MonitorError> {
        self.shared.registry.lock().recent_history(id, limit)
    }

    /// Mean of all tracked baselines, or a fresh snapshot when nothing is tracked
    pub async fn get_baseline_metrics(&self) -> Result<MetricSnapshot, MonitorError> {
        let mean = {
            let registry = self.shared.registry.lock();
            MetricSnapshot::mean(registry.baselines())
        };
        match mean {
            Some(snapshot) => Ok(snapshot),
            None => self.shared.fetch().await,
        }
    }

    /// Compare every active deployment against its baseline.
    ///
    /// Each checked deployment gets a health-check entry. Stops at the first
    /// violation.
    pub fn validate_performance_baselines(&self) -> Result<(), MonitorError> {
        let now = now_ms();
        let mut registry = self.shared.registry.lock();

        let outcomes: Vec<(String, Result<(), BaselineViolation>)> = registry
            .list_active()
            .into_iter()
            .filter_map(|d| {
                d.baseline
                    .as_ref()
                    .map(|baseline| (d.id.clone(), self.shared.validator.validate(&d.current, baseline)))
            })
            .collect();

        for (id, outcome) in outcomes {
            registry.record_health_check(
                &id,
                HealthCheckResult {
                    checked_at: now,
                    passed: outcome.is_ok(),
                    violation: outcome.as_ref().err().map(|v| v.to_string()),
                },
            )?;

            if let Err(violation) = outcome {
                tracing::warn!(
                    deployment_id = %id,
                    field = violation.field,
                    measured = violation.measured,
                    threshold = violation.threshold,
                    tolerance = self.shared.validator.tolerance(),
                    "Baseline violation"
                );
                return Err(MonitorError::BaselineViolation {
                    deployment_id: id,
                    violation,
                });
            }
        }
        Ok(())
    }

    /// Record a feature flag change against every active deployment.
    /// Returns the number of deployments annotated.
    pub fn track_feature_flag_change(&self, mut event: FeatureFlagEvent) -> usize {
        event.timestamp.get_or_insert_with(now_ms);
        let annotated = self.shared.registry.lock().record_flag_change(&event);
        tracing::info!(flag = %event.flag, deployments = annotated, "Feature flag changed");
        annotated
    }

    pub fn alert_states(&self) -> Vec<AlertSummary> {
        self.shared.engine.lock().summaries()
    }

    pub fn set_alert_enabled(&self, name: &str, enabled: bool) -> Result<(), MonitorError> {
        self.shared.engine.lock().set_enabled(name, enabled)
    }

    /// Suppress an alert until `until_ms`, or lift suppression with `None`
    pub fn suppress_alert(&self, name: &str, until_ms: Option<i64>) -> Result<(), MonitorError> {
        self.shared.engine.lock().suppress(name, until_ms)
    }

    pub fn dashboards(&self) -> &[serde_json::Value] {
        &self.dashboards
    }

    /// Provider types receiving snapshots
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Stop the poll loop and archive every still-active deployment.
    ///
    /// Never fails; archival errors are logged. Calling it again archives
    /// nothing.
    pub async fn destroy(&self) -> Vec<Deployment> {
        self.stop().await;

        let _guard = self.shared.tick_lock.lock().await;
        let drained = self
            .shared
            .registry
            .lock()
            .drain(DeploymentStatus::Completed, now_ms());

        for deployment in &drained {
            self.archive(deployment).await;
        }
        if !drained.is_empty() {
            tracing::info!(archived = drained.len(), "Monitor destroyed");
        }
        drained
    }
}

/// Builds a [`DeploymentMonitor`] from configuration and capabilities
pub struct MonitorBuilder {
    config: MonitorConfig,
    source: Option<Arc<dyn MetricsSource>>,
    archive: Option<Arc<dyn ArchivalSink>>,
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    observers: HashMap<String, Arc<dyn MetricsObserver>>,
    poll_interval: Option<Duration>,
}

impl MonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            source: None,
            archive: None,
            channels: HashMap::new(),
            observers: HashMap::new(),
            poll_interval: None,
        }
    }

    pub fn metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Defaults to [`LogArchive`]
    pub fn archive(mut self, archive: Arc<dyn ArchivalSink>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Supply a channel implementation. Configured `external` channels are
    /// matched by name; channels absent from the configuration are
    /// registered as enabled.
    pub fn channel(mut self, name: impl Into<String>, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.insert(name.into(), channel);
        self
    }

    /// Supply the observer for a provider type
    pub fn provider(mut self, kind: impl Into<String>, observer: Arc<dyn MetricsObserver>) -> Self {
        self.observers.insert(kind.into(), observer);
        self
    }

    /// Override the configured poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Validate the configuration, wire up channels, alerts and providers,
    /// and start the poll loop if enabled.
    pub async fn initialize(mut self) -> Result<DeploymentMonitor, MonitorError> {
        let config = self.config;
        config.validate()?;

        let source = self
            .source
            .ok_or_else(|| ConfigError::Invalid("no metrics source configured".into()))?;
        let archive = self.archive.unwrap_or_else(|| Arc::new(LogArchive));

        let mut dispatcher = NotificationDispatcher::new();
        for channel in &config.channels {
            let implementation: Arc<dyn NotificationChannel> = match &channel.kind {
                ChannelKind::Log => Arc::new(LogChannel),
                ChannelKind::Webhook {
                    url,
                    headers,
                    timeout_secs,
                } => Arc::new(
                    WebhookChannel::new(url.clone(), headers.clone(), Duration::from_secs(*timeout_secs))
                        .map_err(|e| ConfigError::Invalid(format!("channel '{}': {}", channel.name, e)))?,
                ),
                ChannelKind::External => match self.channels.remove(&channel.name) {
                    Some(external) => external,
                    None => {
                        tracing::warn!(
                            channel = %channel.name,
                            "No implementation supplied for external channel"
                        );
                        continue;
                    }
                },
            };
            dispatcher.register(channel.name.clone(), implementation, channel.enabled);
        }
        for (name, channel) in self.channels {
            dispatcher.register(name, channel, true);
        }

        let mut engine = AlertEngine::new(config.alert_cooldown());
        for alert in config.alerts.iter().cloned() {
            engine.register(alert)?;
        }

        let mut observers: Vec<Arc<dyn MetricsObserver>> = Vec::new();
        let mut providers = Vec::new();
        for provider in config.providers.iter().filter(|p| p.enabled) {
            let observer: Arc<dyn MetricsObserver> = match self.observers.remove(&provider.kind) {
                Some(observer) => observer,
                None if provider.kind == "log" => Arc::new(LogObserver),
                None => {
                    tracing::warn!(provider = %provider.kind, "No adapter for provider type");
                    continue;
                }
            };
            observers.push(observer);
            providers.push(provider.kind.clone());
        }

        let interval = self.poll_interval.unwrap_or_else(|| config.poll_interval());

        tracing::info!(
            alerts = engine.len(),
            channels = dispatcher.channel_names().len(),
            providers = providers.len(),
            "Deployment monitor initialized"
        );

        let monitor = DeploymentMonitor {
            shared: Arc::new(Shared {
                source,
                archive,
                registry: Mutex::new(DeploymentRegistry::new(config.history_capacity)),
                engine: Mutex::new(engine),
                dispatcher,
                observers,
                validator: BaselineValidator::new(config.baseline_tolerance),
                custom_metrics: config.custom_metrics.clone(),
                notify_on_resolve: config.notify_on_resolve,
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            scheduler: tokio::sync::Mutex::new(Scheduler::new(interval)),
            dashboards: config.dashboards,
            providers,
        };

        if config.enabled {
            monitor.start().await;
        }
        Ok(monitor)
    }
}
