//! Error taxonomy for acquisition, propagation and rendering.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// A network source could not be reached or answered with a failure status.
    #[error("{source_name} unavailable: {reason}")]
    NetworkUnavailable { source_name: String, reason: String },

    /// A response or cached value did not contain a usable two-line element set.
    #[error("malformed element set: {0}")]
    MalformedElementSet(String),

    /// The propagation model rejected the requested instant (decay, degenerate state).
    #[error("propagation unavailable at {minutes:.2} min from epoch: {reason}")]
    PropagationUnavailable { minutes: f64, reason: String },

    /// Image assets could not be read or decoded. Fatal for the render path.
    #[error("failed to load asset {path:?}: {reason}")]
    AssetLoadFailure { path: PathBuf, reason: String },

    #[error("store I/O error on {path:?}: {source}")]
    Store {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("raster error: {0}")]
    Raster(String),
}

impl TrackerError {
    pub fn network(source_name: &str, reason: impl ToString) -> Self {
        TrackerError::NetworkUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Acquisition failures are absorbed by the fallback chain, whatever their cause.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::NetworkUnavailable { .. } | TrackerError::MalformedElementSet(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_failures_are_grouped() {
        assert!(TrackerError::network("primary", "timeout").is_acquisition_failure());
        assert!(TrackerError::MalformedElementSet("short line".into()).is_acquisition_failure());
        assert!(!TrackerError::PropagationUnavailable { minutes: 1.0, reason: "decay".into() }
            .is_acquisition_failure());
    }

    #[test]
    fn network_error_names_its_source() {
        let err = TrackerError::network("Celestrak", "HTTP 503");
        assert_eq!(err.to_string(), "Celestrak unavailable: HTTP 503");
    }
}
