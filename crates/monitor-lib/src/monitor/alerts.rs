//! Drift alerts and push notification
//!
//! Alerts are derived from feature drift results on every cycle; nothing here
//! remembers previous alerts. Delivery goes through an [`AlertNotifier`].

use crate::drift::{feature_recommendation, FeatureDriftResult, Severity};
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Alert severity; only medium and high drift raise alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
}

impl AlertSeverity {
    pub fn from_severity(severity: Severity) -> Option<Self> {
        match severity {
            Severity::High => Some(AlertSeverity::High),
            Severity::Medium => Some(AlertSeverity::Medium),
            Severity::Low | Severity::None => None,
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DataDrift,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::DataDrift => write!(f, "data_drift"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
    pub message: String,
    pub recommendation: String,
    pub triggered_at: DateTime<Utc>,
}

impl Alert {
    /// Alert for a drifting feature, `None` below medium severity
    pub fn for_feature(result: &FeatureDriftResult, triggered_at: DateTime<Utc>) -> Option<Self> {
        let severity = AlertSeverity::from_severity(result.severity)?;
        Some(Self {
            id: format!(
                "drift-{}-{}",
                result.feature_name,
                triggered_at.timestamp_millis()
            ),
            alert_type: AlertType::DataDrift,
            severity,
            feature_name: Some(result.feature_name.clone()),
            message: format!(
                "Feature '{}' has PSI={:.2} (threshold={})",
                result.feature_name, result.drift_score, result.threshold
            ),
            recommendation: feature_recommendation(result),
            triggered_at,
        })
    }
}

/// Alerts for medium and high severity features, in result order
pub fn alerts_from(results: &[FeatureDriftResult], triggered_at: DateTime<Utc>) -> Vec<Alert> {
    results
        .iter()
        .filter_map(|r| Alert::for_feature(r, triggered_at))
        .collect()
}

/// Push delivery of alerts
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            AlertSeverity::High => warn!(
                alert_id = %alert.id,
                severity = %alert.severity,
                message = %alert.message,
                recommendation = %alert.recommendation,
                "Drift alert"
            ),
            AlertSeverity::Medium => info!(
                alert_id = %alert.id,
                severity = %alert.severity,
                message = %alert.message,
                recommendation = %alert.recommendation,
                "Drift alert"
            ),
        }
        Ok(())
    }
}

/// Forwards alerts to an in-process consumer
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Alert>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertNotifier for ChannelNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        // Never wait on a slow consumer from inside a cycle
        self.tx
            .try_send(alert.clone())
            .map_err(|e| MonitorError::Notification(e.to_string()))
    }
}
