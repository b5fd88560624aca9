//! Cross-run comparison of per-question outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one question fared in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    /// Ground truth did not parse.
    Unscorable,
    /// Stored entry could not be read.
    Malformed,
}

impl QuestionOutcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    fn is_scored(self) -> bool {
        matches!(self, Self::Correct | Self::Incorrect)
    }
}

impl std::fmt::Display for QuestionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::Incorrect => write!(f, "incorrect"),
            Self::Unscorable => write!(f, "unscorable"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// Pairwise categorization of two runs over their shared questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunComparison {
    pub both_correct: Vec<String>,
    pub both_incorrect: Vec<String>,
    /// Correct only in the experimental run.
    pub wins: Vec<String>,
    /// Correct only in the baseline run.
    pub losses: Vec<String>,
    pub baseline_only: usize,
    pub experimental_only: usize,
    /// Shared questions unscorable or malformed on either side.
    pub skipped: usize,
}

impl RunComparison {
    /// Questions scored in both runs.
    pub fn compared(&self) -> usize {
        self.both_correct.len() + self.both_incorrect.len() + self.wins.len() + self.losses.len()
    }

    pub fn baseline_accuracy(&self) -> f64 {
        ratio(self.both_correct.len() + self.losses.len(), self.compared())
    }

    pub fn experimental_accuracy(&self) -> f64 {
        ratio(self.both_correct.len() + self.wins.len(), self.compared())
    }

    /// Wins minus losses.
    pub fn net_gain(&self) -> i64 {
        self.wins.len() as i64 - self.losses.len() as i64
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Compare two runs on the questions both contain.
pub fn compare_runs(
    baseline: &BTreeMap<String, QuestionOutcome>,
    experimental: &BTreeMap<String, QuestionOutcome>,
) -> RunComparison {
    let mut comparison = RunComparison {
        baseline_only: baseline
            .keys()
            .filter(|q| !experimental.contains_key(*q))
            .count(),
        experimental_only: experimental
            .keys()
            .filter(|q| !baseline.contains_key(*q))
            .count(),
        ..Default::default()
    };

    for (question, base) in baseline {
        let Some(exp) = experimental.get(question) else {
            continue;
        };
        if !base.is_scored() || !exp.is_scored() {
            comparison.skipped += 1;
            continue;
        }
        let bucket = match (base, exp) {
            (QuestionOutcome::Correct, QuestionOutcome::Correct) => &mut comparison.both_correct,
            (QuestionOutcome::Correct, _) => &mut comparison.losses,
            (_, QuestionOutcome::Correct) => &mut comparison.wins,
            _ => &mut comparison.both_incorrect,
        };
        bucket.push(question.clone());
    }

    comparison
}

/// Markdown report for a comparison.
pub fn format_comparison(comparison: &RunComparison) -> String {
    let mut report = String::new();

    report.push_str("# Run Comparison\n\n");
    report.push_str(&format!(
        "Shared questions compared: {} (skipped {}, baseline only {}, experimental only {})\n\n",
        comparison.compared(),
        comparison.skipped,
        comparison.baseline_only,
        comparison.experimental_only,
    ));

    report.push_str("| Metric | Baseline | Experimental | Delta |\n");
    report.push_str("|--------|----------|--------------|-------|\n");
    report.push_str(&format!(
        "| Accuracy | {:.1}% | {:.1}% | {:+.1}% |\n\n",
        comparison.baseline_accuracy() * 100.0,
        comparison.experimental_accuracy() * 100.0,
        (comparison.experimental_accuracy() - comparison.baseline_accuracy()) * 100.0,
    ));

    report.push_str("| Category | Count |\n");
    report.push_str("|----------|-------|\n");
    report.push_str(&format!("| Both correct | {} |\n", comparison.both_correct.len()));
    report.push_str(&format!("| Both incorrect | {} |\n", comparison.both_incorrect.len()));
    report.push_str(&format!("| Wins (experimental only) | {} |\n", comparison.wins.len()));
    report.push_str(&format!("| Losses (baseline only) | {} |\n", comparison.losses.len()));
    report.push_str(&format!("| Net gain | {:+} |\n", comparison.net_gain()));

    if !comparison.losses.is_empty() {
        report.push_str("\n## Losses\n\n");
        for question in &comparison.losses {
            report.push_str(&format!("- {}\n", first_line(question)));
        }
    }

    report
}

fn first_line(question: &str) -> &str {
    question.lines().next().unwrap_or_default()
}
