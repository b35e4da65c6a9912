//! Periscope Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PERISCOPE_CONFIG: Path to a JSON configuration file (optional)
//! - PERISCOPE_HOST: Bind address (default: 0.0.0.0)
//! - PERISCOPE_PORT: Port number (default: 8080)
//! - PERISCOPE_METRICS_URL: Metrics endpoint polled each tick (default: http://127.0.0.1:9090/metrics/snapshot)
//! - PERISCOPE_ARCHIVE_PATH: JSON-lines file receiving archived deployments (default: log only)
//! - PERISCOPE_POLL_INTERVAL_SECS and the other PERISCOPE_* overrides understood by `MonitorConfig`
//! - RUST_LOG: Log level (default: info)

use std::sync::Arc;

use periscope::api::{run_server, ServerConfig};
use periscope::archive::{ArchivalSink, JsonLinesArchive, LogArchive};
use periscope::config::MonitorConfig;
use periscope::source::HttpMetricsSource;
use periscope::DeploymentMonitor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_METRICS_URL: &str = "http://127.0.0.1:9090/metrics/snapshot";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "periscope=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match std::env::var("PERISCOPE_CONFIG") {
        Ok(path) => MonitorConfig::from_file(path)?,
        Err(_) => MonitorConfig::default(),
    };
    config.apply_env()?;

    let host = std::env::var("PERISCOPE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PERISCOPE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let metrics_url =
        std::env::var("PERISCOPE_METRICS_URL").unwrap_or_else(|_| DEFAULT_METRICS_URL.to_string());
    let archive_path = std::env::var("PERISCOPE_ARCHIVE_PATH").ok();

    tracing::info!("Periscope configuration:");
    tracing::info!("  Host: {}:{}", host, port);
    tracing::info!("  Metrics source: {}", metrics_url);
    tracing::info!("  Poll interval: {} seconds", config.poll_interval_secs);
    tracing::info!("  History capacity: {} points", config.history_capacity);
    tracing::info!("  Baseline tolerance: {}", config.baseline_tolerance);
    tracing::info!("  Alerts: {}", config.alerts.len());
    tracing::info!("  Channels: {}", config.channels.len());
    match &archive_path {
        Some(path) => tracing::info!("  Archive: {}", path),
        None => tracing::info!("  Archive: log"),
    }
    if !config.enabled {
        tracing::info!("  Polling: DISABLED");
    }

    let source = HttpMetricsSource::new(metrics_url)?.with_custom_metrics(config.custom_metrics.clone());
    let archive: Arc<dyn ArchivalSink> = match archive_path {
        Some(path) => Arc::new(JsonLinesArchive::new(path)),
        None => Arc::new(LogArchive),
    };

    let monitor = DeploymentMonitor::builder(config)
        .metrics_source(Arc::new(source))
        .archive(archive)
        .initialize()
        .await?;

    println!(
        r#"
 Periscope - live deployment health tracking
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    let server = ServerConfig { host, port };
    run_server(server, Arc::new(monitor)).await
}
