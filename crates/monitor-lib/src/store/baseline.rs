//! Baseline sources backed by a file or by memory

use super::{async_trait, BaselineSource};
use crate::error::{MonitorError, Result};
use crate::schema::FeatureSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Baseline persisted as a JSON [`FeatureSet`]
#[derive(Debug, Clone)]
pub struct FileBaseline {
    path: PathBuf,
}

impl FileBaseline {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a feature set so later loads pick it up
    pub async fn save(&self, baseline: &FeatureSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(baseline)?;
        tokio::fs::write(&self.path, json).await?;
        info!(path = %self.path.display(), rows = baseline.row_count(), "Baseline saved");
        Ok(())
    }
}

#[async_trait]
impl BaselineSource for FileBaseline {
    async fn load_baseline(&self) -> Result<Option<FeatureSet>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted baseline");
                return Ok(None);
            }
            Err(e) => {
                return Err(MonitorError::Baseline(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let baseline: FeatureSet = serde_json::from_slice(&bytes).map_err(|e| {
            MonitorError::Baseline(format!("malformed baseline {}: {}", self.path.display(), e))
        })?;
        Ok(Some(baseline))
    }
}

/// Baseline held in memory; `None` models a cold start
#[derive(Debug, Clone, Default)]
pub struct StaticBaseline {
    baseline: Option<Arc<FeatureSet>>,
}

impl StaticBaseline {
    pub fn new(baseline: FeatureSet) -> Self {
        Self {
            baseline: Some(Arc::new(baseline)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaselineSource for StaticBaseline {
    async fn load_baseline(&self) -> Result<Option<FeatureSet>> {
        Ok(self.baseline.as_deref().cloned())
    }
}
