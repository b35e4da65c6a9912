//! Archival of deployments leaving the active set

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::model::Deployment;

/// Receives each deployment once, when it stops being tracked
#[async_trait]
pub trait ArchivalSink: Send + Sync {
    async fn archive(&self, deployment: &Deployment) -> Result<(), ArchiveError>;
}

/// Logs a summary of each archived deployment
pub struct LogArchive;

#[async_trait]
impl ArchivalSink for LogArchive {
    async fn archive(&self, deployment: &Deployment) -> Result<(), ArchiveError> {
        tracing::info!(
            deployment_id = %deployment.id,
            version = %deployment.version,
            status = ?deployment.status,
            alerts = deployment.alerts.len(),
            "Archived deployment: {}",
            deployment.current.summary()
        );
        Ok(())
    }
}

/// Appends each archived deployment as one JSON line to a file
pub struct JsonLinesArchive {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArchivalSink for JsonLinesArchive {
    async fn archive(&self, deployment: &Deployment) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_vec(deployment)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(
            deployment_id = %deployment.id,
            path = %self.path.display(),
            "Deployment archived to file"
        );
        Ok(())
    }
}

/// Archival errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Archive rejected deployment: {0}")]
    Rejected(String),
}
