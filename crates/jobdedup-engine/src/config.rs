use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{check_threshold, DedupError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub title: f64,
    pub company: f64,
    pub description: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title: 0.4,
            company: 0.3,
            description: 0.3,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), DedupError> {
        for (name, value) in [
            ("title", self.title),
            ("company", self.company),
            ("description", self.description),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DedupError::InvalidWeights(format!(
                    "{name} weight must be a non-negative number, got {value}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(DedupError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.title + self.company + self.description
    }

    /// Rescale so the weights sum to 1. Callers validate first.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 || (total - 1.0).abs() < f64::EPSILON {
            return *self;
        }
        Self {
            title: self.title / total,
            company: self.company / total,
            description: self.description / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum score for a fuzzy in-batch duplicate.
    pub duplicate_threshold: f64,
    /// Pairs scoring in `[review_threshold, duplicate_threshold)` are reported as near misses.
    pub review_threshold: f64,
    /// Minimum score for a candidate to count as an already persisted posting.
    pub history_threshold: f64,
    pub description_token_limit: usize,
    pub weights: ScoringWeights,
    pub lookup_concurrency: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.75,
            review_threshold: 0.6,
            history_threshold: 0.75,
            description_token_limit: 200,
            weights: ScoringWeights::default(),
            lookup_concurrency: 1,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), DedupError> {
        check_threshold("duplicate_threshold", self.duplicate_threshold)?;
        check_threshold("review_threshold", self.review_threshold)?;
        check_threshold("history_threshold", self.history_threshold)?;
        if self.review_threshold > self.duplicate_threshold {
            return Err(DedupError::InvalidConfig(format!(
                "review_threshold ({}) must not exceed duplicate_threshold ({})",
                self.review_threshold, self.duplicate_threshold
            )));
        }
        if self.description_token_limit == 0 {
            return Err(DedupError::InvalidConfig(
                "description_token_limit must be at least 1".to_string(),
            ));
        }
        if self.lookup_concurrency == 0 {
            return Err(DedupError::InvalidConfig(
                "lookup_concurrency must be at least 1".to_string(),
            ));
        }
        self.weights.validate()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DedupError> {
        Self::parse(text, "<inline>")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DedupError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DedupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, origin: &str) -> Result<Self, DedupError> {
        let config: DedupConfig =
            serde_yaml::from_str(text).map_err(|source| DedupError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}
