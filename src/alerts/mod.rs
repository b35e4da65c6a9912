//! Alerting on metric snapshots
//!
//! Conditions are parsed once into an expression tree, evaluated against each
//! new snapshot, and edges of the per-alert trigger/resolve state machine are
//! fanned out to notification channels.

pub mod config;
pub mod engine;
pub mod expr;
pub mod notifier;

pub use config::{AlertDefinition, AlertState, Severity, Transition};
pub use engine::{AlertEngine, AlertSummary, AlertTransition};
pub use expr::{Expr, ExprError};
pub use notifier::{
    ChannelError, DispatchReport, LogChannel, Notification, NotificationChannel,
    NotificationDispatcher, WebhookChannel,
};
