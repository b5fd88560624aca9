//! Ballots and decisions: the aggregator's input and output records.

use serde::{Deserialize, Serialize};

use crate::extract::{ConfidenceScore, ExtractedAnswer};

/// One agent's answer and confidence for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    /// Agent position within the round.
    pub agent: usize,
    pub answer: ExtractedAnswer,
    #[serde(default)]
    pub confidence: ConfidenceScore,
}

impl Ballot {
    pub fn new(agent: usize, answer: ExtractedAnswer, confidence: ConfidenceScore) -> Self {
        Self {
            agent,
            answer,
            confidence,
        }
    }

    /// Ballot without a critic score.
    pub fn unscored(agent: usize, answer: ExtractedAnswer) -> Self {
        Self::new(agent, answer, ConfidenceScore::Absent)
    }
}

/// Vote strategy used to turn ballots into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VotingStrategy {
    /// One vote per ballot; confidence ignored.
    Majority,
    /// Each ballot votes with its confidence.
    WeightedSum,
    /// Each ballot votes with `exp(alpha * normalized_confidence)`.
    Exponential { alpha: f64 },
}

impl Default for VotingStrategy {
    fn default() -> Self {
        Self::Majority
    }
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Majority => write!(f, "majority"),
            Self::WeightedSum => write!(f, "weighted_sum"),
            Self::Exponential { alpha } => write!(f, "exponential(alpha={})", alpha),
        }
    }
}

/// Aggregate support for one distinct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub answer: String,
    /// Ballots that voted for this answer.
    pub votes: u32,
    /// Summed vote weight under the active strategy.
    pub weight: f64,
    /// Highest raw confidence among this answer's ballots.
    pub max_confidence: f64,
    /// Position of the first ballot carrying this answer.
    pub first_seen: usize,
}

/// The aggregator's output for one set of ballots.
///
/// Carries the ballots it was computed from, unchanged, so every decision
/// can be traced back to its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub answer: ExtractedAnswer,
    pub strategy: VotingStrategy,
    /// Per-answer support, in first-seen order.
    pub tally: Vec<TallyEntry>,
    pub ballots: Vec<Ballot>,
    /// Ballot positions removed by the confidence gate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<usize>,
    /// Ballots without a parseable answer.
    #[serde(default)]
    pub abstentions: usize,
    /// Every answer failed the confidence gate; the most confident one was taken.
    #[serde(default)]
    pub fallback_triggered: bool,
}

impl Decision {
    /// Decision over no usable ballot.
    pub fn no_answer(strategy: VotingStrategy, ballots: Vec<Ballot>) -> Self {
        let abstentions = ballots.iter().filter(|b| !b.answer.is_answer()).count();
        Self {
            answer: ExtractedAnswer::NoAnswer,
            strategy,
            tally: Vec::new(),
            ballots,
            excluded: Vec::new(),
            abstentions,
            fallback_triggered: false,
        }
    }

    pub fn has_answer(&self) -> bool {
        self.answer.is_answer()
    }

    /// Whether every ballot that answered agrees.
    pub fn is_unanimous(&self) -> bool {
        let mut answers = self.ballots.iter().filter_map(|b| b.answer.as_str());
        match answers.next() {
            Some(first) => answers.all(|a| a == first),
            None => false,
        }
    }

    /// Tally entry of the winning answer.
    pub fn winner_entry(&self) -> Option<&TallyEntry> {
        let winner = self.answer.as_str()?;
        self.tally.iter().find(|e| e.answer == winner)
    }

    /// Votes cast for `answer`.
    pub fn votes_for(&self, answer: &str) -> u32 {
        self.tally
            .iter()
            .find(|e| e.answer == answer)
            .map(|e| e.votes)
            .unwrap_or(0)
    }
}
