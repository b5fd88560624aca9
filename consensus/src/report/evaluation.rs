//! Accuracy evaluation of a result set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::QuestionOutcome;
use crate::engine::ConsensusEngine;
use crate::extract::ExtractedAnswer;
use crate::results::{AgentEntry, LoadReport, Problem, ResultSet};

/// Outcome of one question under the evaluating engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvaluation {
    pub question: String,
    pub outcome: QuestionOutcome,
    pub predicted: ExtractedAnswer,
    pub expected: Option<f64>,
    pub fallback_triggered: bool,
}

/// Per-agent accuracy in the first and final rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAccuracy {
    pub agent: usize,
    pub first_round: f64,
    pub final_round: f64,
    /// Scorable questions this agent answered.
    pub samples: usize,
}

/// Decisions the run recorded itself, scored against the ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedSummary {
    /// Scorable questions carrying recorded decisions.
    pub questions: usize,
    pub voting_correct: usize,
    pub final_correct: usize,
    pub fallback: usize,
    pub recanted: usize,
    /// Recanted questions whose recorded final answer is right.
    pub recanted_correct: usize,
}

impl RecordedSummary {
    pub fn voting_accuracy(&self) -> f64 {
        ratio(self.voting_correct, self.questions)
    }

    pub fn final_accuracy(&self) -> f64 {
        ratio(self.final_correct, self.questions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub generated_at: DateTime<Utc>,
    pub strategy: String,
    pub total_questions: usize,
    pub scorable: usize,
    pub correct: usize,
    pub unscorable: usize,
    pub malformed: usize,
    /// Questions whose final round produced no answer at all.
    pub no_answer: usize,
    /// Questions decided by the low-confidence fallback.
    pub fallback: usize,
    /// Final accuracy over scorable questions.
    pub accuracy: f64,
    /// Standard error of the accuracy.
    pub std_error: f64,
    /// Accuracy of the decision after each round; shorter debates carry their last round forward.
    pub round_accuracy: Vec<f64>,
    pub agents: Vec<AgentAccuracy>,
    /// Present when any record carries decisions written by the run itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded: Option<RecordedSummary>,
    pub questions: Vec<QuestionEvaluation>,
}

#[derive(Default)]
struct AgentTally {
    first_correct: usize,
    final_correct: usize,
    samples: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Score every question in `results` with `engine`.
pub fn evaluate(results: &ResultSet, report: &LoadReport, engine: &ConsensusEngine) -> Evaluation {
    let max_rounds = results.iter().map(|(_, r)| r.rounds.len()).max().unwrap_or(0);
    let mut round_correct = vec![0usize; max_rounds];
    let mut agent_tallies: Vec<AgentTally> = Vec::new();
    let mut questions = Vec::with_capacity(results.len());
    let (mut correct, mut scorable, mut no_answer, mut fallback) = (0, 0, 0, 0);
    let mut recorded: Option<RecordedSummary> = None;

    for (question, record) in results.iter() {
        let decision = engine.final_decision(record);
        let verdict = engine.score(&decision, &record.ground_truth);
        let outcome = if verdict.is_scorable() {
            QuestionOutcome::from_correct(verdict.correct)
        } else {
            QuestionOutcome::Unscorable
        };

        if !decision.has_answer() {
            no_answer += 1;
        }
        if decision.fallback_triggered {
            fallback += 1;
        }

        if verdict.is_scorable() {
            scorable += 1;
            if verdict.correct {
                correct += 1;
            }

            for (round, hits) in round_correct.iter_mut().enumerate() {
                let Some(entries) = record.rounds.get(round).or(record.rounds.last()) else {
                    continue;
                };
                if engine.score(&engine.decide_round(entries), &record.ground_truth).correct {
                    *hits += 1;
                }
            }

            if let Some(outcome) = &record.recorded {
                let right = |answer: &Option<String>| {
                    answer.as_deref().is_some_and(|text| {
                        let answer = engine.extractor().extract(text);
                        engine.scorer().score(&answer, &record.ground_truth).correct
                    })
                };
                let final_right = right(&outcome.final_answer);
                let summary = recorded.get_or_insert_with(RecordedSummary::default);
                summary.questions += 1;
                summary.voting_correct += usize::from(right(&outcome.voting_answer));
                summary.final_correct += usize::from(final_right);
                summary.fallback += usize::from(outcome.fallback_triggered);
                if outcome.recanted {
                    summary.recanted += 1;
                    summary.recanted_correct += usize::from(final_right);
                }
            }

            if let (Some(first), Some(last)) = (record.first_round(), record.final_round()) {
                let agent_correct = |entries: &[AgentEntry], agent: usize| {
                    entries.get(agent).is_some_and(|entry| {
                        let answer = engine.extractor().extract(&entry.solution);
                        engine.scorer().score(&answer, &record.ground_truth).correct
                    })
                };
                let agents = first.len().max(last.len());
                if agent_tallies.len() < agents {
                    agent_tallies.resize_with(agents, AgentTally::default);
                }
                for (agent, tally) in agent_tallies.iter_mut().enumerate().take(agents) {
                    tally.samples += 1;
                    tally.first_correct += usize::from(agent_correct(first, agent));
                    tally.final_correct += usize::from(agent_correct(last, agent));
                }
            }
        }

        questions.push(QuestionEvaluation {
            question: question.clone(),
            outcome,
            predicted: decision.answer.clone(),
            expected: verdict.expected,
            fallback_triggered: decision.fallback_triggered,
        });
    }

    let accuracy = ratio(correct, scorable);
    let std_error = if scorable == 0 {
        0.0
    } else {
        (accuracy * (1.0 - accuracy)).sqrt() / (scorable as f64).sqrt()
    };

    Evaluation {
        generated_at: Utc::now(),
        strategy: engine.aggregator().config().strategy.to_string(),
        total_questions: results.len() + report.malformed.len(),
        scorable,
        correct,
        unscorable: results.len() - scorable,
        malformed: report.malformed.len(),
        no_answer,
        fallback,
        accuracy,
        std_error,
        round_accuracy: round_correct.iter().map(|&c| ratio(c, scorable)).collect(),
        agents: agent_tallies
            .iter()
            .enumerate()
            .map(|(agent, t)| AgentAccuracy {
                agent,
                first_round: ratio(t.first_correct, t.samples),
                final_round: ratio(t.final_correct, t.samples),
                samples: t.samples,
            })
            .collect(),
        recorded,
        questions,
    }
}

impl Evaluation {
    /// Questions answered incorrectly.
    pub fn hard_questions(&self) -> Vec<&str> {
        self.questions
            .iter()
            .filter(|q| q.outcome == QuestionOutcome::Incorrect)
            .map(|q| q.question.as_str())
            .collect()
    }

    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("# Debate Evaluation\n\n");
        report.push_str(&format!(
            "Generated {} with strategy `{}`\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.strategy
        ));

        report.push_str("## Summary\n\n");
        report.push_str(&format!(
            "| Metric | Value |\n\
             |--------|-------|\n\
             | Questions | {} |\n\
             | Scorable | {} |\n\
             | Correct | {} |\n\
             | Accuracy | {:.4} ± {:.4} |\n\
             | Unscorable | {} |\n\
             | Malformed | {} |\n\
             | No answer | {} |\n\
             | Fallback decisions | {} |\n\n",
            self.total_questions,
            self.scorable,
            self.correct,
            self.accuracy,
            self.std_error,
            self.unscorable,
            self.malformed,
            self.no_answer,
            self.fallback,
        ));

        if !self.round_accuracy.is_empty() {
            report.push_str("## Accuracy by Round\n\n");
            report.push_str("| Round | Accuracy |\n|-------|----------|\n");
            for (round, acc) in self.round_accuracy.iter().enumerate() {
                report.push_str(&format!("| {} | {:.1}% |\n", round + 1, acc * 100.0));
            }
            report.push('\n');
        }

        if !self.agents.is_empty() {
            report.push_str("## Agents\n\n");
            report.push_str("| Agent | First Round | Final Round |\n|-------|-------------|-------------|\n");
            for agent in &self.agents {
                report.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% |\n",
                    agent.agent,
                    agent.first_round * 100.0,
                    agent.final_round * 100.0
                ));
            }
            report.push('\n');
        }

        if let Some(recorded) = &self.recorded {
            report.push_str("## Recorded Decisions\n\n");
            report.push_str(&format!(
                "| Metric | Value |\n\
                 |--------|-------|\n\
                 | Questions | {} |\n\
                 | Voting accuracy | {:.1}% |\n\
                 | Final accuracy | {:.1}% |\n\
                 | Fallback triggered | {} |\n\
                 | Recanted | {} |\n",
                recorded.questions,
                recorded.voting_accuracy() * 100.0,
                recorded.final_accuracy() * 100.0,
                recorded.fallback,
                recorded.recanted,
            ));
            if recorded.recanted > 0 {
                report.push_str(&format!(
                    "| Recanted accuracy | {:.1}% |\n",
                    ratio(recorded.recanted_correct, recorded.recanted) * 100.0
                ));
            }
            report.push('\n');
        }

        report
    }
}

/// Corpus entries for every incorrectly answered question.
///
/// Questions missing from the corpus are rebuilt from the stored ground truth.
pub fn hard_problems(evaluation: &Evaluation, results: &ResultSet, corpus: &[Problem]) -> Vec<Problem> {
    evaluation
        .hard_questions()
        .into_iter()
        .filter_map(|question| {
            corpus
                .iter()
                .find(|p| p.question == question)
                .cloned()
                .or_else(|| {
                    results.get(question).map(|record| Problem {
                        question: question.to_string(),
                        answer: record.ground_truth.clone(),
                    })
                })
        })
        .collect()
}
