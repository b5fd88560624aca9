//! Scoring: compare a decision against the ground truth.

use serde::{Deserialize, Serialize};

use crate::extract::{parse_ground_truth, ExtractedAnswer};
use crate::voting::Decision;

/// Scorer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Absolute tolerance for numeric equality.
    pub tolerance: f64,
    /// Accept ground truths without the `####` delimiter (last number wins).
    pub lenient_ground_truth: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            lenient_ground_truth: false,
        }
    }
}

/// Outcome of comparing one prediction with one ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub correct: bool,
    /// Normalized prediction, when it parsed.
    pub predicted: Option<f64>,
    /// Normalized ground truth, when it parsed.
    pub expected: Option<f64>,
}

impl Verdict {
    /// Whether the ground truth parsed; unscorable questions are left out of accuracy.
    pub fn is_scorable(&self) -> bool {
        self.expected.is_some()
    }
}

/// Float-tolerant comparison of answers against ground truth.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Normalized ground-truth value, if the reference parses.
    pub fn expected_value(&self, ground_truth: &str) -> Option<f64> {
        parse_ground_truth(ground_truth, self.config.lenient_ground_truth)
            .and_then(|v| v.parse::<f64>().ok())
    }

    /// Score one answer. Never fails: unparseable sides yield `correct == false`.
    pub fn score(&self, answer: &ExtractedAnswer, ground_truth: &str) -> Verdict {
        let expected = self.expected_value(ground_truth);
        let predicted = answer.to_f64();
        let correct = match (predicted, expected) {
            (Some(p), Some(e)) => (p - e).abs() <= self.config.tolerance,
            _ => false,
        };
        Verdict {
            correct,
            predicted,
            expected,
        }
    }

    pub fn score_decision(&self, decision: &Decision, ground_truth: &str) -> Verdict {
        self.score(&decision.answer, ground_truth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: &str) -> ExtractedAnswer {
        ExtractedAnswer::Value(v.to_string())
    }

    #[test]
    fn test_comma_insensitive_match() {
        let verdict = Scorer::default().score(&value("1200"), "Work...\n#### 1,200");
        assert!(verdict.correct);
        assert_eq!(verdict.predicted, Some(1200.0));
        assert_eq!(verdict.expected, Some(1200.0));
    }

    #[test]
    fn test_float_formatting() {
        let scorer = Scorer::default();
        assert!(scorer.score(&value("1000.0"), "#### 1000").correct);
        assert!(scorer.score(&value("0.3333334"), "#### 0.3333333").correct);
        assert!(!scorer.score(&value("1001"), "#### 1000").correct);
    }

    #[test]
    fn test_no_answer_is_incorrect() {
        let verdict = Scorer::default().score(&ExtractedAnswer::NoAnswer, "#### 5");
        assert!(!verdict.correct);
        assert!(verdict.is_scorable());
        assert_eq!(verdict.predicted, None);
    }

    #[test]
    fn test_unparseable_ground_truth() {
        let verdict = Scorer::default().score(&value("5"), "five");
        assert!(!verdict.correct);
        assert!(!verdict.is_scorable());
    }

    #[test]
    fn test_lenient_ground_truth() {
        let scorer = Scorer::new(ScorerConfig {
            lenient_ground_truth: true,
            ..Default::default()
        });
        assert!(scorer.score(&value("5"), "The answer is 5").correct);
    }
}
