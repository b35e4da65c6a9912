use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    baseline_metrics, dashboards, deployment_history, deployment_metrics, feature_flag_change,
    get_deployment, health_check, list_alerts, list_deployments, set_alert_enabled,
    start_tracking, stop_tracking, suppress_alert, validate_baselines, AppState,
};
use crate::monitor::DeploymentMonitor;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Deployment tracking
        .route("/deployments", get(list_deployments).post(start_tracking))
        .route("/deployments/:id", get(get_deployment).delete(stop_tracking))
        .route("/deployments/:id/metrics", get(deployment_metrics))
        .route("/deployments/:id/history", get(deployment_history))
        // Baselines
        .route("/baseline", get(baseline_metrics))
        .route("/baseline/validate", post(validate_baselines))
        // Annotations
        .route("/feature-flags", post(feature_flag_change))
        // Alerts
        .route("/alerts", get(list_alerts))
        .route("/alerts/:name/enabled", post(set_alert_enabled))
        .route("/alerts/:name/suppress", post(suppress_alert))
        .route("/dashboards", get(dashboards))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the HTTP API until Ctrl+C, then tear the monitor down
pub async fn run_server(
    config: ServerConfig,
    monitor: Arc<DeploymentMonitor>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState {
        monitor: Arc::clone(&monitor),
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Periscope server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let archived = monitor.destroy().await;
    tracing::info!(archived = archived.len(), "Periscope server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, stopping monitor..."),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
