pub mod deployment;
pub mod snapshot;

pub use deployment::{AlertEvent, Deployment, DeploymentStatus, FeatureFlagEvent, HealthCheckResult};
pub use snapshot::{
    BusinessMetrics, MetricSnapshot, MobileMetrics, PerformanceMetrics, ResourceUsage, WebVitals,
};
