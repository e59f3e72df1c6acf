//! Error types for the monitoring core
//!
//! Absence of data is never an error: empty samples, missing features and
//! windows without labels all resolve to neutral values. The variants here
//! cover failures of the collaborators the core depends on.

use std::time::Duration;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Failure of a dependency or of a record at the store boundary
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The prediction/ground-truth store failed or is unavailable
    #[error("store error: {0}")]
    Store(String),

    /// The baseline source failed to load a reference feature set
    #[error("baseline source error: {0}")]
    Baseline(String),

    /// An outbound call exceeded its time budget
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// An alert could not be handed to its notifier
    #[error("notification error: {0}")]
    Notification(String),

    /// A record did not match the feature schema
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MonitorError {
    /// Shorthand for a store failure
    pub fn store(message: impl Into<String>) -> Self {
        MonitorError::Store(message.into())
    }

    /// Returns true when the error came from an elapsed timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::Timeout { .. })
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Store(format!("{:#}", err))
    }
}

/// Run a collaborator call under a timeout, mapping elapse to [`MonitorError::Timeout`]
pub async fn with_timeout<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::Timeout { operation, timeout }),
    }
}
