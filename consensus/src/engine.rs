//! The consensus engine: extractor, aggregator, and scorer behind one handle.

use std::collections::BTreeMap;

use crate::compare::QuestionOutcome;
use crate::config::ConsensusConfig;
use crate::extract::Extractor;
use crate::results::{round_ballots, AgentEntry, LoadReport, QuestionRecord, ResultSet};
use crate::scoring::{Scorer, Verdict};
use crate::voting::{Aggregator, Ballot, Decision};

#[derive(Debug, Clone, Default)]
pub struct ConsensusEngine {
    extractor: Extractor,
    aggregator: Aggregator,
    scorer: Scorer,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            extractor: Extractor::new(config.extractor),
            aggregator: Aggregator::new(config.aggregator),
            scorer: Scorer::new(config.scorer),
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn ballots(&self, entries: &[AgentEntry]) -> Vec<Ballot> {
        round_ballots(entries, &self.extractor)
    }

    /// Decide one round from its stored entries.
    pub fn decide_round(&self, entries: &[AgentEntry]) -> Decision {
        self.aggregator.decide(&self.ballots(entries))
    }

    /// Decision over the final round, recomputed with this engine's settings.
    pub fn final_decision(&self, record: &QuestionRecord) -> Decision {
        self.decide_round(record.final_round().unwrap_or_default())
    }

    pub fn score(&self, decision: &Decision, ground_truth: &str) -> Verdict {
        self.scorer.score_decision(decision, ground_truth)
    }

    /// Outcome of one record's final decision.
    pub fn outcome(&self, record: &QuestionRecord) -> QuestionOutcome {
        let verdict = self.score(&self.final_decision(record), &record.ground_truth);
        if verdict.is_scorable() {
            QuestionOutcome::from_correct(verdict.correct)
        } else {
            QuestionOutcome::Unscorable
        }
    }

    /// Per-question outcomes for a loaded run, malformed entries included.
    pub fn outcomes(
        &self,
        results: &ResultSet,
        report: &LoadReport,
    ) -> BTreeMap<String, QuestionOutcome> {
        let mut outcomes: BTreeMap<String, QuestionOutcome> = results
            .iter()
            .map(|(question, record)| (question.clone(), self.outcome(record)))
            .collect();
        for entry in &report.malformed {
            outcomes.insert(entry.question.clone(), QuestionOutcome::Malformed);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedAnswer;
    use crate::results::{MalformedEntry, ScoreEntry};
    use crate::voting::{AggregatorConfig, VotingStrategy};

    fn record(ground_truth: &str, final_round: Vec<AgentEntry>) -> QuestionRecord {
        let mut record = QuestionRecord::new(ground_truth);
        record.rounds.push(vec![AgentEntry::new("warmup")]);
        record.rounds.push(final_round);
        record
    }

    #[test]
    fn test_final_round_drives_decision() {
        let engine = ConsensusEngine::default();
        let rec = record(
            "#### 12",
            vec![
                AgentEntry::new("\\boxed{12}"),
                AgentEntry::new("I get 12"),
                AgentEntry::new("\\boxed{13}"),
            ],
        );
        let decision = engine.final_decision(&rec);
        assert_eq!(decision.answer, ExtractedAnswer::Value("12".into()));
        assert_eq!(engine.outcome(&rec), QuestionOutcome::Correct);
    }

    #[test]
    fn test_scored_entries_weight_votes() {
        let engine = ConsensusEngine::new(ConsensusConfig {
            aggregator: AggregatorConfig {
                strategy: VotingStrategy::WeightedSum,
                ..Default::default()
            },
            ..Default::default()
        });
        let entries = vec![
            AgentEntry::new("\\boxed{5}").with_score(ScoreEntry::Scalar(9.0)),
            AgentEntry::new("\\boxed{7}").with_score(ScoreEntry::Scalar(2.0)),
            AgentEntry::new("\\boxed{7}").with_score(ScoreEntry::Rubric {
                logic_score: 2.0,
                computation_score: 4.0,
                critique: None,
            }),
        ];
        // 9 vs 2 + 3
        assert_eq!(
            engine.decide_round(&entries).answer,
            ExtractedAnswer::Value("5".into())
        );
    }

    #[test]
    fn test_empty_record_has_no_answer() {
        let engine = ConsensusEngine::default();
        let rec = QuestionRecord::new("#### 3");
        assert!(!engine.final_decision(&rec).has_answer());
        assert_eq!(engine.outcome(&rec), QuestionOutcome::Incorrect);
    }

    #[test]
    fn test_outcomes_include_malformed() {
        let engine = ConsensusEngine::default();
        let mut results = ResultSet::new();
        results.insert("ok", record("#### 1", vec![AgentEntry::new("\\boxed{1}")]));
        results.insert("no gt", record("unknown", vec![AgentEntry::new("\\boxed{1}")]));
        let report = LoadReport {
            malformed: vec![MalformedEntry {
                question: "broken".into(),
                reason: "unrecognized record shape".into(),
            }],
            ..Default::default()
        };

        let outcomes = engine.outcomes(&results, &report);
        assert_eq!(outcomes["ok"], QuestionOutcome::Correct);
        assert_eq!(outcomes["no gt"], QuestionOutcome::Unscorable);
        assert_eq!(outcomes["broken"], QuestionOutcome::Malformed);
    }
}
