//! How agents behave over a debate: agreement, answer changes, and critic calibration.

use serde::{Deserialize, Serialize};

use crate::engine::ConsensusEngine;
use crate::extract::ExtractedAnswer;
use crate::results::{AgentEntry, ResultSet, ScoreEntry};

/// Mean critic scores over a group of agent answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    /// Answers in the group.
    pub count: usize,
    pub mean_confidence: Option<f64>,
    pub mean_logic: Option<f64>,
    pub mean_computation: Option<f64>,
}

#[derive(Default)]
struct ScoreAccumulator {
    count: usize,
    confidence: Vec<f64>,
    logic: Vec<f64>,
    computation: Vec<f64>,
}

impl ScoreAccumulator {
    fn add(&mut self, entry: &AgentEntry) {
        self.count += 1;
        if let Some(c) = Option::<f64>::from(entry.confidence()) {
            self.confidence.push(c);
        }
        if let Some(ScoreEntry::Rubric {
            logic_score,
            computation_score,
            ..
        }) = &entry.score
        {
            self.logic.push(*logic_score);
            self.computation.push(*computation_score);
        }
    }

    fn finish(&self) -> ScoreStats {
        ScoreStats {
            count: self.count,
            mean_confidence: mean(&self.confidence),
            mean_logic: mean(&self.logic),
            mean_computation: mean(&self.computation),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Scores split by whether the agent's own answer was right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSplit {
    pub correct: ScoreStats,
    pub incorrect: ScoreStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateDynamics {
    pub questions: usize,
    /// Share of questions whose final-round answers are all identical.
    pub consensus_rate: f64,
    /// Share of agents whose final answer differs from their first.
    pub change_rate: f64,
    /// Agents compared for `change_rate`.
    pub agents_compared: usize,
    pub first_round: CalibrationSplit,
    pub final_round: CalibrationSplit,
}

/// Analyze agreement and critic calibration across `results`.
pub fn analyze(results: &ResultSet, engine: &ConsensusEngine) -> DebateDynamics {
    let extractor = engine.extractor();
    let mut questions = 0usize;
    let mut consensus = 0usize;
    let mut changed = 0usize;
    let mut agents_compared = 0usize;
    let mut first = (ScoreAccumulator::default(), ScoreAccumulator::default());
    let mut last = (ScoreAccumulator::default(), ScoreAccumulator::default());

    for (_, record) in results.iter() {
        let (Some(first_round), Some(final_round)) = (record.first_round(), record.final_round())
        else {
            continue;
        };
        questions += 1;

        let first_answers: Vec<ExtractedAnswer> =
            first_round.iter().map(|e| extractor.extract(&e.solution)).collect();
        let final_answers: Vec<ExtractedAnswer> =
            final_round.iter().map(|e| extractor.extract(&e.solution)).collect();

        if final_answers
            .first()
            .is_some_and(|a| a.is_answer() && final_answers.iter().all(|b| b == a))
        {
            consensus += 1;
        }

        if record.rounds.len() > 1 {
            for (before, after) in first_answers.iter().zip(&final_answers) {
                agents_compared += 1;
                if before != after {
                    changed += 1;
                }
            }
        }

        if engine.scorer().expected_value(&record.ground_truth).is_none() {
            continue;
        }
        let split = |entries: &[AgentEntry],
                     answers: &[ExtractedAnswer],
                     acc: &mut (ScoreAccumulator, ScoreAccumulator)| {
            for (entry, answer) in entries.iter().zip(answers) {
                if engine.scorer().score(answer, &record.ground_truth).correct {
                    acc.0.add(entry);
                } else {
                    acc.1.add(entry);
                }
            }
        };
        split(first_round, &first_answers, &mut first);
        split(final_round, &final_answers, &mut last);
    }

    let rate = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    DebateDynamics {
        questions,
        consensus_rate: rate(consensus, questions),
        change_rate: rate(changed, agents_compared),
        agents_compared,
        first_round: CalibrationSplit {
            correct: first.0.finish(),
            incorrect: first.1.finish(),
        },
        final_round: CalibrationSplit {
            correct: last.0.finish(),
            incorrect: last.1.finish(),
        },
    }
}

fn fmt_mean(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

impl DebateDynamics {
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("# Debate Dynamics\n\n");
        report.push_str(&format!(
            "- Questions: {}\n\
             - Consensus rate: {:.2}%\n\
             - Answer change rate: {:.2}% ({} agents)\n\n",
            self.questions,
            self.consensus_rate * 100.0,
            self.change_rate * 100.0,
            self.agents_compared,
        ));

        report.push_str("## Critic Scores\n\n");
        report.push_str("| Round | Group | Answers | Confidence | Logic | Computation |\n");
        report.push_str("|-------|-------|---------|------------|-------|-------------|\n");
        for (round, split) in [("First", &self.first_round), ("Final", &self.final_round)] {
            for (group, stats) in [("correct", &split.correct), ("incorrect", &split.incorrect)] {
                report.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    round,
                    group,
                    stats.count,
                    fmt_mean(stats.mean_confidence),
                    fmt_mean(stats.mean_logic),
                    fmt_mean(stats.mean_computation),
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::QuestionRecord;

    fn rubric(logic: f64, computation: f64) -> ScoreEntry {
        ScoreEntry::Rubric {
            logic_score: logic,
            computation_score: computation,
            critique: None,
        }
    }

    fn fixture() -> ResultSet {
        let mut results = ResultSet::new();

        let mut agreed = QuestionRecord::new("#### 6");
        agreed.rounds.push(vec![
            AgentEntry::new("\\boxed{6}").with_score(rubric(9.0, 9.0)),
            AgentEntry::new("\\boxed{5}").with_score(rubric(3.0, 5.0)),
        ]);
        agreed.rounds.push(vec![
            AgentEntry::new("\\boxed{6}").with_score(rubric(10.0, 8.0)),
            AgentEntry::new("\\boxed{6}").with_score(rubric(8.0, 8.0)),
        ]);
        results.insert("agreed", agreed);

        let mut split = QuestionRecord::new("#### 2");
        split.rounds.push(vec![AgentEntry::new("\\boxed{2}"), AgentEntry::new("\\boxed{3}")]);
        split.rounds.push(vec![AgentEntry::new("\\boxed{2}"), AgentEntry::new("\\boxed{3}")]);
        results.insert("split", split);

        results
    }

    #[test]
    fn test_consensus_and_change() {
        let dynamics = analyze(&fixture(), &ConsensusEngine::default());
        assert_eq!(dynamics.questions, 2);
        assert!((dynamics.consensus_rate - 0.5).abs() < 1e-12);
        assert_eq!(dynamics.agents_compared, 4);
        assert!((dynamics.change_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_unanimous_no_answer_is_not_consensus() {
        let mut results = ResultSet::new();
        let mut silent = QuestionRecord::new("#### 1");
        silent.rounds.push(vec![AgentEntry::new("no idea"), AgentEntry::new("pass")]);
        results.insert("silent", silent);

        let dynamics = analyze(&results, &ConsensusEngine::default());
        assert_eq!(dynamics.questions, 1);
        assert_eq!(dynamics.consensus_rate, 0.0);
    }

    #[test]
    fn test_calibration_split() {
        let dynamics = analyze(&fixture(), &ConsensusEngine::default());
        let first = &dynamics.first_round;
        assert_eq!(first.correct.count, 2);
        assert_eq!(first.correct.mean_logic, Some(9.0));
        assert_eq!(first.incorrect.count, 2);
        assert_eq!(first.incorrect.mean_confidence, Some(4.0));
        assert_eq!(dynamics.final_round.correct.mean_computation, Some(8.0));
    }

    #[test]
    fn test_format_report() {
        let text = analyze(&fixture(), &ConsensusEngine::default()).format_report();
        assert!(text.contains("Consensus rate: 50.00%"));
        assert!(text.contains("| First | incorrect | 2 | 4.00 | 3.00 | 5.00 |"));
    }
}
