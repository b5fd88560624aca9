//! Ballot aggregation: majority, confidence-weighted, and gated votes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ballot::{Ballot, Decision, TallyEntry, VotingStrategy};
use crate::extract::ExtractedAnswer;

/// Rule for choosing among answers with equal support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The answer whose first ballot came earliest.
    #[default]
    FirstSeen,
    /// The numerically smallest answer.
    SmallestValue,
}

/// Aggregator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub strategy: VotingStrategy,
    /// Ballots below this confidence do not vote. `None` disables the gate.
    pub confidence_cutoff: Option<f64>,
    /// Confidence assumed for ballots without a critic score.
    pub neutral_confidence: f64,
    /// Top of the confidence scale, used to normalize exponential weights.
    pub max_score: f64,
    pub tie_break: TieBreak,
    /// Scores closer than this are treated as tied.
    pub tie_epsilon: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            strategy: VotingStrategy::Majority,
            confidence_cutoff: None,
            neutral_confidence: 5.0,
            max_score: 10.0,
            tie_break: TieBreak::FirstSeen,
            tie_epsilon: 1e-9,
        }
    }
}

/// Resolves a set of ballots into one [`Decision`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Decide on a winner. Empty input is valid and yields `NoAnswer`.
    pub fn decide(&self, ballots: &[Ballot]) -> Decision {
        let strategy = self.config.strategy;
        let usable: Vec<(usize, &Ballot)> = ballots
            .iter()
            .enumerate()
            .filter(|(_, b)| b.answer.is_answer())
            .collect();

        if usable.is_empty() {
            return Decision::no_answer(strategy, ballots.to_vec());
        }

        let (candidates, excluded): (Vec<(usize, &Ballot)>, Vec<(usize, &Ballot)>) =
            match self.config.confidence_cutoff {
                Some(cutoff) => usable
                    .iter()
                    .copied()
                    .partition(|(_, b)| self.raw_confidence(b) >= cutoff),
                None => (usable.clone(), Vec::new()),
            };

        let fallback_triggered = candidates.is_empty();
        let voters = if fallback_triggered { &usable } else { &candidates };
        let tally = self.tally(voters);

        let winner = if fallback_triggered {
            debug!(
                excluded = excluded.len(),
                "all answers below confidence cutoff, taking most confident"
            );
            self.pick(&tally, |e| e.max_confidence)
        } else {
            match strategy {
                VotingStrategy::Majority => self.pick(&tally, |e| e.votes as f64),
                _ => self.pick(&tally, |e| e.weight),
            }
        };

        let answer = winner
            .map(|e| ExtractedAnswer::Value(e.answer.clone()))
            .unwrap_or(ExtractedAnswer::NoAnswer);

        Decision {
            answer,
            strategy,
            tally,
            ballots: ballots.to_vec(),
            excluded: excluded.iter().map(|(i, _)| *i).collect(),
            abstentions: ballots.len() - usable.len(),
            fallback_triggered,
        }
    }

    fn raw_confidence(&self, ballot: &Ballot) -> f64 {
        ballot.confidence.value_or(self.config.neutral_confidence)
    }

    /// Weight of one ballot, saturated to a finite value.
    fn vote_weight(&self, ballot: &Ballot) -> f64 {
        let confidence = self.raw_confidence(ballot);
        let weight = match self.config.strategy {
            VotingStrategy::Majority => 1.0,
            VotingStrategy::WeightedSum => confidence,
            VotingStrategy::Exponential { alpha } => {
                let normalized = if self.config.max_score > 0.0 {
                    (confidence / self.config.max_score).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (alpha * normalized).exp()
            }
        };
        saturate(weight)
    }

    /// Per-answer support in first-seen order.
    fn tally(&self, voters: &[(usize, &Ballot)]) -> Vec<TallyEntry> {
        let mut tally: Vec<TallyEntry> = Vec::new();
        for (position, ballot) in voters {
            let Some(answer) = ballot.answer.as_str() else {
                continue;
            };
            let weight = self.vote_weight(ballot);
            let confidence = self.raw_confidence(ballot);
            match tally.iter_mut().find(|e| e.answer == answer) {
                Some(entry) => {
                    entry.votes += 1;
                    entry.weight = saturate(entry.weight + weight);
                    entry.max_confidence = entry.max_confidence.max(confidence);
                }
                None => tally.push(TallyEntry {
                    answer: answer.to_string(),
                    votes: 1,
                    weight,
                    max_confidence: confidence,
                    first_seen: *position,
                }),
            }
        }
        tally
    }

    /// Highest-scoring entry, ties resolved by the configured rule.
    fn pick<'a>(
        &self,
        tally: &'a [TallyEntry],
        score: impl Fn(&TallyEntry) -> f64,
    ) -> Option<&'a TallyEntry> {
        let best = tally
            .iter()
            .map(&score)
            .filter(|s| !s.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        // with no comparable score every entry ties
        let tied = tally.iter().filter(|e| {
            let s = score(*e);
            best == f64::NEG_INFINITY || s == best || (best - s).abs() <= self.config.tie_epsilon
        });

        match self.config.tie_break {
            TieBreak::FirstSeen => tied.min_by_key(|e| e.first_seen),
            TieBreak::SmallestValue => tied.min_by(|a, b| {
                let av = a.answer.parse::<f64>().unwrap_or(f64::INFINITY);
                let bv = b.answer.parse::<f64>().unwrap_or(f64::INFINITY);
                av.total_cmp(&bv).then(a.first_seen.cmp(&b.first_seen))
            }),
        }
    }
}

/// Clamp to the finite range so weights stay comparable and serializable.
fn saturate(weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(f64::MIN, f64::MAX)
    }
}
