//! Multi-agent debate runner.
//!
//! ```text
//! for each question (bounded pool):
//!   round 0: every agent answers the initial prompt
//!   [critic scores the round: per agent, jointly, or by blind peer review]
//!   round r: every agent sees the others (plain, score-aware, or its reviews), or restarts
//!   final decision ──► QuestionRecord ──► ResultSet ──► atomic save
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::prompts::{self, PeerView};
use super::service::{CompletionError, CompletionService};
use crate::engine::ConsensusEngine;
use crate::extract::{
    parse_confidence_line, parse_explanation, parse_multi_critic, parse_rubric, ConfidenceScore,
    ExtractedAnswer,
};
use crate::message::ChatMessage;
use crate::results::{AgentEntry, Problem, QuestionRecord, ResultSet, ResultsError, ScoreEntry};

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("Completion failed for question {question:?}: {source}")]
    Completion {
        question: String,
        #[source]
        source: CompletionError,
    },

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("Debate worker failed: {0}")]
    Worker(String),

    #[error("Invalid debate config: {0}")]
    InvalidConfig(String),
}

/// How agent solutions are scored between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticMode {
    /// No scoring; later rounds use the plain debate prompt.
    #[default]
    Off,
    /// One critic call per agent, answered as `Confidence Score:` / `Explanation:` lines.
    PerAgent,
    /// One critic call that scores every agent as JSON.
    Joint,
    /// Every agent reviews all anonymized solutions with a rubric; the mean
    /// `final_score` is the score and the critiques become the explanation.
    BlindReview,
}

impl CriticMode {
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Debate shape and scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    pub agents: usize,
    pub rounds: usize,
    pub critic: CriticMode,
    /// Restart every agent when all critic scores in a round fall below this.
    pub restart_threshold: Option<f64>,
    /// Stop early when all agents agree and every score reaches this.
    pub early_stop_threshold: Option<f64>,
    pub max_concurrent_questions: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            agents: 3,
            rounds: 3,
            critic: CriticMode::Off,
            restart_threshold: None,
            early_stop_threshold: None,
            max_concurrent_questions: 1,
        }
    }
}

impl DebateConfig {
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.agents == 0 {
            return Err(DebateError::InvalidConfig("agents must be at least 1".into()));
        }
        if self.rounds == 0 {
            return Err(DebateError::InvalidConfig("rounds must be at least 1".into()));
        }
        if self.max_concurrent_questions == 0 {
            return Err(DebateError::InvalidConfig(
                "max_concurrent_questions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Counts from one corpus run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    /// Questions already present in the result set.
    pub skipped: usize,
}

/// How agents are prompted for the next round.
enum NextTurn {
    Debate,
    Restart,
    Stop,
}

/// Runs debates against a completion service.
#[derive(Clone)]
pub struct DebateRunner {
    service: Arc<dyn CompletionService>,
    engine: Arc<ConsensusEngine>,
    config: DebateConfig,
}

impl DebateRunner {
    pub fn new(
        service: Arc<dyn CompletionService>,
        engine: ConsensusEngine,
        config: DebateConfig,
    ) -> Result<Self, DebateError> {
        config.validate()?;
        Ok(Self {
            service,
            engine: Arc::new(engine),
            config,
        })
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    async fn complete(&self, question: &str, messages: &[ChatMessage]) -> Result<String, DebateError> {
        self.service
            .complete(messages)
            .await
            .map_err(|source| DebateError::Completion {
                question: question.to_string(),
                source,
            })
    }

    /// Debate one question to completion.
    pub async fn run_question(&self, problem: &Problem) -> Result<QuestionRecord, DebateError> {
        let question = problem.question.as_str();
        let agents = self.config.agents;
        let neutral = self.engine.aggregator().config().neutral_confidence;

        let mut contexts: Vec<Vec<ChatMessage>> =
            (0..agents).map(|_| vec![prompts::initial_prompt(question)]).collect();
        let mut record = QuestionRecord::new(problem.answer.clone());

        for round in 0..self.config.rounds {
            let mut entries = Vec::with_capacity(agents);
            for context in contexts.iter_mut() {
                let reply = self.complete(question, context).await?;
                context.push(ChatMessage::assistant(reply.clone()));
                entries.push(AgentEntry::new(reply));
            }

            let answers: Vec<ExtractedAnswer> = entries
                .iter()
                .map(|e| self.engine.extractor().extract(&e.solution))
                .collect();

            if self.config.critic.is_enabled() {
                self.critique(question, &mut entries, &answers).await?;
            }

            let scores: Vec<f64> = entries
                .iter()
                .map(|e| e.confidence().value_or(neutral))
                .collect();

            debug!(
                round,
                answers = ?answers.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
                "round complete"
            );

            let turn = if round + 1 == self.config.rounds {
                NextTurn::Stop
            } else {
                self.next_turn(&answers, &scores)
            };

            match turn {
                NextTurn::Stop => {}
                NextTurn::Restart => {
                    info!(round, "all critic scores low, restarting agents");
                    for (i, context) in contexts.iter_mut().enumerate() {
                        let previous = PeerView {
                            answer: &answers[i],
                            score: scores[i],
                            solution: &entries[i].solution,
                        };
                        let explanation = entries[i].explanation.as_deref().unwrap_or("");
                        *context = vec![prompts::restart_prompt(question, previous, explanation)];
                    }
                }
                NextTurn::Debate => {
                    for (i, context) in contexts.iter_mut().enumerate() {
                        let prompt = if self.config.critic == CriticMode::BlindReview {
                            let feedback = entries[i]
                                .explanation
                                .as_deref()
                                .unwrap_or("No reviews were returned.");
                            prompts::correction_prompt(question, &entries[i].solution, feedback)
                        } else if self.config.critic.is_enabled() {
                            let view = |j: usize| PeerView {
                                answer: &answers[j],
                                score: scores[j],
                                solution: &entries[j].solution,
                            };
                            let others: Vec<PeerView<'_>> =
                                (0..agents).filter(|&j| j != i).map(view).collect();
                            prompts::score_aware_prompt(question, view(i), &others)
                        } else {
                            let others: Vec<&str> = entries
                                .iter()
                                .enumerate()
                                .filter(|(j, _)| *j != i)
                                .map(|(_, e)| e.solution.as_str())
                                .collect();
                            prompts::debate_prompt(question, &others)
                        };
                        context.push(prompt);
                    }
                }
            }

            record.rounds.push(entries);
            if matches!(turn, NextTurn::Stop) {
                break;
            }
        }

        let decision = self.engine.final_decision(&record);
        record.decision = Some(decision);
        Ok(record)
    }

    /// Attach critic scores and explanations to one round's entries.
    async fn critique(
        &self,
        question: &str,
        entries: &mut [AgentEntry],
        answers: &[ExtractedAnswer],
    ) -> Result<(), DebateError> {
        match self.config.critic {
            CriticMode::Off => {}
            CriticMode::PerAgent => {
                for entry in entries.iter_mut() {
                    let reply = self
                        .complete(question, &[prompts::critic_prompt(question, &entry.solution)])
                        .await?;
                    entry.score = Option::<f64>::from(parse_confidence_line(&reply)).map(ScoreEntry::Scalar);
                    entry.explanation = Some(parse_explanation(&reply));
                }
            }
            CriticMode::Joint => {
                let shown: Vec<(&ExtractedAnswer, &str)> = answers
                    .iter()
                    .zip(entries.iter())
                    .map(|(a, e)| (a, e.solution.as_str()))
                    .collect();
                let reply = self
                    .complete(question, &[prompts::multi_critic_prompt(question, &shown)])
                    .await?;
                for (entry, assessment) in entries
                    .iter_mut()
                    .zip(parse_multi_critic(&reply, answers.len()))
                {
                    if let Some(score) = Option::<f64>::from(assessment.score) {
                        entry.score = Some(ScoreEntry::Scalar(score));
                    }
                    entry.explanation = Some(assessment.explanation);
                }
            }
            CriticMode::BlindReview => {
                let labels: Vec<String> = (0..entries.len()).map(prompts::candidate_label).collect();
                let candidates: Vec<(String, &str)> = labels
                    .iter()
                    .cloned()
                    .zip(entries.iter().map(|e| e.solution.as_str()))
                    .collect();
                let prompt = prompts::blind_review_prompt(question, &candidates);

                let mut scores: Vec<Vec<f64>> = vec![Vec::new(); entries.len()];
                let mut feedback: Vec<String> = vec![String::new(); entries.len()];
                for _judge in 0..entries.len() {
                    let reply = self.complete(question, &prompt).await?;
                    for review in parse_rubric(&reply) {
                        let Some(idx) = labels.iter().position(|l| *l == review.candidate) else {
                            continue;
                        };
                        let score = match review.final_score {
                            ConfidenceScore::Present(score) => {
                                scores[idx].push(score);
                                score.to_string()
                            }
                            ConfidenceScore::Absent => "n/a".to_string(),
                        };
                        feedback[idx].push_str(&format!("- Judge: {} (Score: {})\n", review.critique, score));
                    }
                }

                for ((entry, scores), feedback) in entries.iter_mut().zip(scores).zip(feedback) {
                    if !scores.is_empty() {
                        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                        entry.score = Some(ScoreEntry::Scalar(mean));
                    }
                    if !feedback.is_empty() {
                        entry.explanation = Some(feedback);
                    }
                }
            }
        }
        Ok(())
    }

    fn next_turn(&self, answers: &[ExtractedAnswer], scores: &[f64]) -> NextTurn {
        if !self.config.critic.is_enabled() {
            return NextTurn::Debate;
        }
        if let Some(high) = self.config.early_stop_threshold {
            let agreed = answers.first().is_some_and(|first| {
                first.is_answer() && answers.iter().all(|a| a == first)
            });
            if agreed && scores.iter().all(|&s| s >= high) {
                return NextTurn::Stop;
            }
        }
        if let Some(low) = self.config.restart_threshold {
            if scores.iter().all(|&s| s < low) {
                return NextTurn::Restart;
            }
        }
        NextTurn::Debate
    }

    /// Debate every unanswered question in `problems`, saving after each one.
    ///
    /// Questions already in `results`, readable or not, are skipped, so an
    /// interrupted run resumes where it stopped without touching old entries. On a failure the set is saved before the
    /// error is returned.
    pub async fn run_corpus(
        &self,
        problems: &[Problem],
        results: &mut ResultSet,
        output: &Path,
    ) -> Result<RunSummary, DebateError> {
        let mut summary = RunSummary::default();
        let mut pending: Vec<Problem> = Vec::new();
        for problem in problems {
            if results.contains(&problem.question)
                || pending.iter().any(|p| p.question == problem.question)
            {
                summary.skipped += 1;
            } else {
                pending.push(problem.clone());
            }
        }

        info!(
            pending = pending.len(),
            skipped = summary.skipped,
            workers = self.config.max_concurrent_questions,
            "starting debate run"
        );

        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_questions));
        let mut join_set: JoinSet<(String, Result<QuestionRecord, DebateError>)> = JoinSet::new();

        for problem in pending {
            let sem = sem.clone();
            let runner = self.clone();
            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (
                        problem.question,
                        Err(DebateError::Worker("worker pool closed".into())),
                    );
                };
                let result = runner.run_question(&problem).await;
                (problem.question, result)
            });
        }

        let total = join_set.len();
        while let Some(joined) = join_set.join_next().await {
            let failure = match joined {
                Ok((question, Ok(record))) => {
                    results.insert(question.clone(), record);
                    results.save(output)?;
                    summary.completed += 1;
                    info!(
                        done = summary.completed,
                        total,
                        question = %first_line(&question),
                        "question saved"
                    );
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => DebateError::Worker(e.to_string()),
            };

            warn!(error = %failure, "debate failed, flushing results");
            join_set.abort_all();
            // keep questions that finished before the abort landed
            while let Some(joined) = join_set.join_next().await {
                if let Ok((question, Ok(record))) = joined {
                    results.insert(question, record);
                }
            }
            results.save(output)?;
            return Err(failure);
        }

        results.save(output)?;
        Ok(summary)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
