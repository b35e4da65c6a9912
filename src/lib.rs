//! Periscope: Live Deployment Health Tracking
//!
//! Tracks active deployments against a metrics source, keeps a bounded
//! history per deployment, evaluates alert conditions on every poll and
//! validates live metrics against the baseline captured when tracking began.
//!
//! # Features
//!
//! - **Deployment Registry**: Insertion-ordered set of active deployments
//! - **Bounded History**: Fixed-capacity ring of snapshots per deployment
//! - **Safe Alert Conditions**: Comparisons and `&&`/`||` over metric fields, parsed once
//! - **Alert State Machine**: Edge-triggered notifications with cooldown suppression
//! - **Notification Fan-out**: Concurrent delivery, a failing channel never blocks the rest
//! - **Baseline Validation**: Tolerance band around the captured baseline
//! - **Non-reentrant Polling**: Ticks never overlap, even when one overruns
//!
//! # Example
//!
//! ```no_run
//! use periscope::alerts::{AlertDefinition, Severity};
//! use periscope::config::MonitorConfig;
//! use periscope::source::HttpMetricsSource;
//! use periscope::DeploymentMonitor;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), periscope::MonitorError> {
//! let config = MonitorConfig::default()
//!     .with_alert(AlertDefinition::new("errors", "errorRate > 5", Severity::High));
//!
//! let monitor = DeploymentMonitor::builder(config)
//!     .metrics_source(Arc::new(HttpMetricsSource::new("http://metrics.local/snapshot")?))
//!     .initialize()
//!     .await?;
//!
//! monitor.start_deployment_tracking("web-42", "2.3.0").await?;
//! monitor.validate_performance_baselines()?;
//! monitor.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod archive;
pub mod baseline;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod source;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use model::{Deployment, DeploymentStatus, MetricSnapshot};
pub use monitor::{DeploymentMonitor, MetricsObserver, MonitorBuilder, TickReport};
