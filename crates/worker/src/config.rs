//! Worker configuration

use anyhow::Result;
use monitor_lib::store::{BaselineSource, FileBaseline, InMemoryStore, StaticBaseline};
use monitor_lib::{FeatureSchema, MonitorConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Worker configuration, read from `MONITOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Identifier attached to every log line
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Persisted baseline; cycles fall back to a flagged synthetic one when unset or absent
    #[serde(default)]
    pub baseline_path: Option<PathBuf>,

    /// JSON-lines prediction records, tailed every cycle
    #[serde(default)]
    pub predictions_path: Option<PathBuf>,

    /// JSON-lines ground truth records, tailed every cycle
    #[serde(default)]
    pub labels_path: Option<PathBuf>,

    /// Append every persisted report to this JSON-lines file
    #[serde(default)]
    pub report_log: Option<PathBuf>,

    #[serde(flatten)]
    pub monitor: MonitorConfig,
}

fn default_worker_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "drift-monitor".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            api_port: default_api_port(),
            baseline_path: None,
            predictions_path: None,
            labels_path: None,
            report_log: None,
            monitor: MonitorConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true))
            .build()?;

        Ok(Self::from_config(config))
    }

    fn from_config(config: config::Config) -> Self {
        config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid worker configuration, using defaults");
            WorkerConfig::default()
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        self.monitor.clone()
    }

    /// Bounded store over the fraud-transaction schema with the configured feeds
    pub fn build_store(&self) -> InMemoryStore {
        let mut store =
            InMemoryStore::with_limits(FeatureSchema::fraud_transactions(), self.monitor.store_limits());
        if let Some(path) = &self.report_log {
            store = store.with_report_log(path);
        }
        if let Some(path) = &self.predictions_path {
            info!(path = %path.display(), "Tailing prediction records");
            store = store.with_prediction_feed(path);
        }
        if let Some(path) = &self.labels_path {
            info!(path = %path.display(), "Tailing ground truth records");
            store = store.with_label_feed(path);
        }
        store
    }

    /// Baseline file when configured; otherwise none, so the orchestrator's flagged fallback applies
    pub fn baseline_source(&self) -> Arc<dyn BaselineSource> {
        match &self.baseline_path {
            Some(path) => {
                info!(path = %path.display(), "Using persisted baseline");
                Arc::new(FileBaseline::new(path))
            }
            None => {
                info!(
                    seed = self.monitor.synthetic_seed,
                    samples = self.monitor.synthetic_baseline_samples,
                    "No baseline path configured, cycles will use the synthetic baseline"
                );
                Arc::new(StaticBaseline::empty())
            }
        }
    }
}
