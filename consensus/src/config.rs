//! Engine configuration, loadable from TOML.
//!
//! Every field has a default, so a partial file (or none at all) is valid:
//!
//! ```toml
//! [aggregator]
//! confidence_cutoff = 4.0
//! strategy = { kind = "exponential", alpha = 1.0 }
//!
//! [scorer]
//! tolerance = 1e-5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::extract::ExtractorConfig;
use crate::scoring::ScorerConfig;
use crate::voting::{AggregatorConfig, VotingStrategy};

/// Largest exponential alpha whose weights stay finite.
const MAX_EXPONENTIAL_ALPHA: f64 = 700.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {message}")]
    Invalid { message: String },
}

/// Settings for the extractor, aggregator, and scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub extractor: ExtractorConfig,
    pub aggregator: AggregatorConfig,
    pub scorer: ScorerConfig,
}

impl ConsensusConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.scorer.tolerance.is_nan() || self.scorer.tolerance < 0.0 {
            return invalid("scorer.tolerance must be non-negative");
        }
        if self.aggregator.max_score.is_nan() || self.aggregator.max_score <= 0.0 {
            return invalid("aggregator.max_score must be positive");
        }
        if self.aggregator.tie_epsilon.is_nan() || self.aggregator.tie_epsilon < 0.0 {
            return invalid("aggregator.tie_epsilon must be non-negative");
        }
        if !self.aggregator.neutral_confidence.is_finite() {
            return invalid("aggregator.neutral_confidence must be finite");
        }
        if self
            .aggregator
            .confidence_cutoff
            .is_some_and(|cutoff| !cutoff.is_finite())
        {
            return invalid("aggregator.confidence_cutoff must be finite");
        }
        if let VotingStrategy::Exponential { alpha } = self.aggregator.strategy {
            if !alpha.is_finite() || alpha.abs() > MAX_EXPONENTIAL_ALPHA {
                return invalid("aggregator.strategy.alpha must be finite and at most 700 in magnitude");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::{TieBreak, VotingStrategy};

    #[test]
    fn test_rejects_overflowing_alpha() {
        let err = ConsensusConfig::from_toml_str(
            r#"
            [aggregator]
            strategy = { kind = "exponential", alpha = 1000.0 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let mut config = ConsensusConfig::default();
        config.aggregator.neutral_confidence = f64::INFINITY;
        assert!(config.validate().is_err());
        config.aggregator.neutral_confidence = 5.0;
        config.aggregator.confidence_cutoff = Some(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            ConsensusConfig::from_toml_str("").unwrap(),
            ConsensusConfig::default()
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = ConsensusConfig::from_toml_str(
            r#"
            [aggregator]
            confidence_cutoff = 4.0
            tie_break = "smallest_value"
            strategy = { kind = "exponential", alpha = 2.0 }

            [scorer]
            lenient_ground_truth = true

            [extractor]
            fallback_to_last_number = false
            "#,
        )
        .unwrap();
        assert_eq!(config.aggregator.confidence_cutoff, Some(4.0));
        assert_eq!(config.aggregator.tie_break, TieBreak::SmallestValue);
        assert_eq!(
            config.aggregator.strategy,
            VotingStrategy::Exponential { alpha: 2.0 }
        );
        assert_eq!(config.aggregator.neutral_confidence, 5.0);
        assert!(config.scorer.lenient_ground_truth);
        assert!(!config.extractor.fallback_to_last_number);
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let err = ConsensusConfig::from_toml_str("[scorer]\ntolerance = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ConsensusConfig::from_toml_file("/nonexistent/consensus.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
