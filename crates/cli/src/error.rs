//! CLI input errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("file not found: {0}")]
    MissingFile(PathBuf),

    #[error("feature '{0}' is not present in the baseline")]
    UnknownFeature(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("drift detected in {0} feature(s)")]
    DriftDetected(usize),

    #[error("{path}:{line}: malformed report: {source}")]
    MalformedReport {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
