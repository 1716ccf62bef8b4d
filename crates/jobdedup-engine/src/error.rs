use std::path::PathBuf;

use thiserror::Error;

/// Caller misuse and configuration problems. Noisy listing data is never an error.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),
    #[error("invalid dedup config: {0}")]
    InvalidConfig(String),
    #[error("parsing dedup config {origin}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("reading dedup config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn check_threshold(name: &'static str, value: f64) -> Result<f64, DedupError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DedupError::InvalidThreshold { name, value })
    }
}
