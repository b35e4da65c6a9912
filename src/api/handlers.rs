use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::AlertSummary;
use crate::error::MonitorError;
use crate::history::MetricDataPoint;
use crate::model::{Deployment, DeploymentStatus, FeatureFlagEvent, MetricSnapshot};
use crate::monitor::DeploymentMonitor;

/// Application state shared across handlers
pub struct AppState {
    pub monitor: Arc<DeploymentMonitor>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_deployments: usize,
    pub polling: bool,
    pub poll_interval_secs: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_deployments: state.monitor.list_active().len(),
        polling: state.monitor.is_running().await,
        poll_interval_secs: state.monitor.poll_interval().await.as_secs(),
    })
}

// ============================================================================
// Deployments
// ============================================================================

pub async fn list_deployments(State(state): State<Arc<AppState>>) -> Json<Vec<Deployment>> {
    Json(state.monitor.list_active())
}

#[derive(Deserialize)]
pub struct StartTrackingRequest {
    pub id: String,
    pub version: String,
}

pub async fn start_tracking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTrackingRequest>,
) -> Result<(StatusCode, Json<Deployment>), ApiError> {
    let deployment = state
        .monitor
        .start_deployment_tracking(&request.id, &request.version)
        .await?;
    Ok((StatusCode::CREATED, Json(deployment)))
}

pub async fn get_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, ApiError> {
    Ok(Json(state.monitor.deployment(&id)?))
}

#[derive(Deserialize)]
pub struct StopTrackingParams {
    pub status: Option<DeploymentStatus>,
}

pub async fn stop_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<StopTrackingParams>,
) -> Result<Json<Deployment>, ApiError> {
    let status = params.status.unwrap_or(DeploymentStatus::Completed);
    let deployment = state.monitor.stop_tracking_with_status(&id, status).await?;
    Ok(Json(deployment))
}

pub async fn deployment_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MetricSnapshot>, ApiError> {
    Ok(Json(state.monitor.get_deployment_metrics(&id)?))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    /// Only the newest `limit` points
    pub limit: Option<usize>,
}

pub async fn deployment_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MetricDataPoint>>, ApiError> {
    let history = match params.limit {
        Some(limit) => state.monitor.recent_history(&id, limit)?,
        None => state.monitor.history(&id)?,
    };
    Ok(Json(history))
}

// ============================================================================
// Baselines
// ============================================================================

pub async fn baseline_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricSnapshot>, ApiError> {
    Ok(Json(state.monitor.get_baseline_metrics().await?))
}

pub async fn validate_baselines(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.monitor.validate_performance_baselines()?;
    Ok(Json(serde_json::json!({ "valid": true })))
}

// ============================================================================
// Feature Flags
// ============================================================================

pub async fn feature_flag_change(
    State(state): State<Arc<AppState>>,
    Json(event): Json<FeatureFlagEvent>,
) -> Json<serde_json::Value> {
    let annotated = state.monitor.track_feature_flag_change(event);
    Json(serde_json::json!({ "annotated": annotated }))
}

// ============================================================================
// Alerts
// ============================================================================

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<AlertSummary>> {
    Json(state.monitor.alert_states())
}

#[derive(Deserialize)]
pub struct EnableAlertRequest {
    pub enabled: bool,
}

pub async fn set_alert_enabled(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<EnableAlertRequest>,
) -> Result<StatusCode, ApiError> {
    state.monitor.set_alert_enabled(&name, request.enabled)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SuppressAlertRequest {
    /// Unix millis; null lifts suppression
    pub until: Option<i64>,
}

pub async fn suppress_alert(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<SuppressAlertRequest>,
) -> Result<StatusCode, ApiError> {
    state.monitor.suppress_alert(&name, request.until)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboards(State(state): State<Arc<AppState>>) -> Json<Vec<serde_json::Value>> {
    Json(state.monitor.dashboards().to_vec())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    Upstream(String),
    Internal(String),
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        let message = err.to_string();
        match err {
            MonitorError::NotFound(_) | MonitorError::UnknownAlert(_) => ApiError::NotFound(message),
            MonitorError::DuplicateDeployment(_) | MonitorError::DuplicateAlert(_) => {
                ApiError::Conflict(message)
            }
            MonitorError::BaselineViolation { .. } => ApiError::Unprocessable(message),
            MonitorError::MetricsFetch(_) => ApiError::Upstream(message),
            MonitorError::Config(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
