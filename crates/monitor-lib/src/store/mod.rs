//! Persistence and baseline collaborators
//!
//! The monitoring core reaches storage only through [`MonitoringStore`] and
//! the reference distribution only through [`BaselineSource`]. Both are
//! injected at construction so tests can substitute doubles.

mod baseline;
mod feed;
mod memory;
mod synthetic;

pub use baseline::{FileBaseline, StaticBaseline};
pub use feed::JsonlFeed;
pub use memory::{InMemoryStore, StoreLimits, StoreStats};
pub use synthetic::{
    DriftProfile, SyntheticBatch, SyntheticGenerator, DEFAULT_BASELINE_SAMPLES, DEFAULT_FRAUD_RATE,
    DEFAULT_SEED,
};

use crate::error::Result;
use crate::models::{LabeledPair, MetricsSnapshot, SystemHealthSnapshot, TimeWindow, WindowCounts};
use crate::monitor::{Alert, MonitoringReport};
use crate::schema::FeatureSet;
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Prediction and ground-truth store.
///
/// Every window query is scoped to the half-open interval `[start, end)`.
#[async_trait]
pub trait MonitoringStore: Send + Sync {
    /// Pull in records written since the last call and drop expired ones
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Feature columns of predictions recorded in the window
    async fn feature_samples(&self, window: &TimeWindow) -> Result<FeatureSet>;

    /// Positive-class probabilities of predictions recorded in the window
    async fn prediction_scores(&self, window: &TimeWindow) -> Result<Vec<f64>>;

    /// Predictions in the window joined with their labels by transaction id
    async fn labeled_pairs(&self, window: &TimeWindow) -> Result<Vec<LabeledPair>>;

    /// Up to `limit` most recent scores recorded strictly before `before`
    async fn reference_scores(&self, before: DateTime<Utc>, limit: usize) -> Result<Vec<f64>>;

    /// Predictions and labels recorded in the window
    async fn window_counts(&self, window: &TimeWindow) -> Result<WindowCounts>;

    async fn persist_report(&self, report: &MonitoringReport) -> Result<()>;

    async fn persist_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()>;

    async fn persist_alert(&self, alert: &Alert) -> Result<()>;

    async fn persist_system_health(&self, snapshot: &SystemHealthSnapshot) -> Result<()>;
}

/// Source of the reference feature distribution
#[async_trait]
pub trait BaselineSource: Send + Sync {
    /// The persisted baseline, or `None` when none exists yet
    async fn load_baseline(&self) -> Result<Option<FeatureSet>>;
}
