//! Per-question result records and the legacy shapes they are read from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::extract::{ConfidenceScore, Extractor};
use crate::message::{ChatMessage, Role};
use crate::voting::{Ballot, Decision};

/// A critic score as persisted: either a single number or a logic/computation rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreEntry {
    Scalar(f64),
    Rubric {
        logic_score: f64,
        computation_score: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        critique: Option<String>,
    },
}

impl ScoreEntry {
    /// Single confidence value; a rubric contributes the mean of its two scores.
    pub fn confidence(&self) -> ConfidenceScore {
        match self {
            Self::Scalar(v) => ConfidenceScore::Present(*v),
            Self::Rubric {
                logic_score,
                computation_score,
                ..
            } => ConfidenceScore::Present((logic_score + computation_score) / 2.0),
        }
    }
}

/// One agent's output for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Raw response text, stored as produced.
    pub solution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AgentEntry {
    pub fn new(solution: impl Into<String>) -> Self {
        Self {
            solution: solution.into(),
            score: None,
            explanation: None,
        }
    }

    pub fn with_score(mut self, score: ScoreEntry) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn confidence(&self) -> ConfidenceScore {
        self.score
            .as_ref()
            .map(ScoreEntry::confidence)
            .unwrap_or(ConfidenceScore::Absent)
    }
}

/// Decisions a run wrote down itself, kept alongside the recomputed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    /// Answer of the vote taken before verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub fallback_triggered: bool,
    /// An agent withdrew its earlier answer during verification.
    #[serde(default)]
    pub recanted: bool,
}

/// Everything recorded for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub ground_truth: String,
    /// `rounds[r][a]` is agent `a`'s entry in round `r`.
    pub rounds: Vec<Vec<AgentEntry>>,
    /// Decision taken when the record was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded: Option<RecordedOutcome>,
}

impl QuestionRecord {
    pub fn new(ground_truth: impl Into<String>) -> Self {
        Self {
            ground_truth: ground_truth.into(),
            rounds: Vec::new(),
            decision: None,
            recorded: None,
        }
    }

    pub fn first_round(&self) -> Option<&[AgentEntry]> {
        self.rounds.first().map(Vec::as_slice)
    }

    pub fn final_round(&self) -> Option<&[AgentEntry]> {
        self.rounds.last().map(Vec::as_slice)
    }

    /// Ballots for round `round`, extracted fresh from the stored text.
    pub fn ballots(&self, round: usize, extractor: &Extractor) -> Vec<Ballot> {
        self.rounds
            .get(round)
            .map(|entries| round_ballots(entries, extractor))
            .unwrap_or_default()
    }

    /// Ballots for the last round.
    pub fn final_ballots(&self, extractor: &Extractor) -> Vec<Ballot> {
        self.final_round()
            .map(|entries| round_ballots(entries, extractor))
            .unwrap_or_default()
    }
}

/// Extract one ballot per agent entry.
pub fn round_ballots(entries: &[AgentEntry], extractor: &Extractor) -> Vec<Ballot> {
    entries
        .iter()
        .enumerate()
        .map(|(agent, entry)| Ballot::new(agent, extractor.extract(&entry.solution), entry.confidence()))
        .collect()
}

/// Shapes accepted when reading a persisted result entry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredRecord {
    Native(QuestionRecord),
    CriticActor(CriticActorRecord),
    Staged(StagedRecord),
    Transcript(Vec<Vec<ChatMessage>>, String),
}

/// First- and final-round records written by the critic/actor experiments.
#[derive(Debug, Deserialize)]
pub(crate) struct CriticActorRecord {
    ground_truth: String,
    round_1_results: Vec<AgentEntry>,
    final_round_results: Vec<AgentEntry>,
}

/// Blind-review runs: first-round solutions, peer scores, corrected finals,
/// and the decisions the run took.
#[derive(Debug, Deserialize)]
pub(crate) struct StagedRecord {
    ground_truth: String,
    round_1: Vec<StagedSolution>,
    round_3_finals: Vec<StagedFinal>,
    /// Peer review scores keyed by agent index.
    #[serde(default)]
    round_2_scores: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    temp_decision: Option<Value>,
    #[serde(default)]
    final_decision: Option<Value>,
    #[serde(default)]
    fallback_triggered: Option<bool>,
    #[serde(default)]
    recanted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StagedSolution {
    #[serde(default)]
    id: Option<usize>,
    solution: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StagedFinal {
    #[serde(default)]
    original_idx: Option<usize>,
    #[serde(default)]
    answer: Option<Value>,
    #[serde(default)]
    full_text: Option<String>,
}

/// Text form of a loosely typed answer field.
fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl StagedRecord {
    fn into_record(self) -> QuestionRecord {
        let score_of = |agent: usize| {
            self.round_2_scores
                .get(&agent.to_string())
                .filter(|scores| !scores.is_empty())
                .map(|scores| ScoreEntry::Scalar(scores.iter().sum::<f64>() / scores.len() as f64))
        };

        let mut first: Vec<(usize, String)> = self
            .round_1
            .into_iter()
            .enumerate()
            .map(|(pos, s)| (s.id.unwrap_or(pos), s.solution))
            .collect();
        first.sort_by_key(|(agent, _)| *agent);

        let mut finals: Vec<(usize, String)> = self
            .round_3_finals
            .into_iter()
            .enumerate()
            .map(|(pos, f)| {
                let text = f
                    .full_text
                    .or_else(|| f.answer.as_ref().and_then(answer_text))
                    .unwrap_or_default();
                (f.original_idx.unwrap_or(pos), text)
            })
            .collect();
        finals.sort_by_key(|(agent, _)| *agent);

        let to_round = |entries: Vec<(usize, String)>| -> Vec<AgentEntry> {
            entries
                .into_iter()
                .map(|(agent, solution)| AgentEntry {
                    solution,
                    score: score_of(agent),
                    explanation: None,
                })
                .collect()
        };
        let mut rounds = vec![to_round(first)];
        if !finals.is_empty() {
            rounds.push(to_round(finals));
        }

        QuestionRecord {
            ground_truth: self.ground_truth,
            rounds,
            decision: None,
            recorded: Some(RecordedOutcome {
                voting_answer: self.temp_decision.as_ref().and_then(answer_text),
                final_answer: self.final_decision.as_ref().and_then(answer_text),
                fallback_triggered: self.fallback_triggered.unwrap_or(false),
                recanted: self.recanted.unwrap_or(false),
            }),
        }
    }
}

/// Why a stored entry could not be turned into a [`QuestionRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Agents in a transcript answered a different number of times.
    RaggedTranscript { agent: usize, expected: usize, found: usize },
    /// A transcript without any assistant message.
    EmptyTranscript,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RaggedTranscript {
                agent,
                expected,
                found,
            } => write!(
                f,
                "agent {} has {} responses, expected {}",
                agent, found, expected
            ),
            Self::EmptyTranscript => write!(f, "transcript has no assistant responses"),
        }
    }
}

impl std::error::Error for ShapeError {}

impl StoredRecord {
    pub(crate) fn is_legacy(&self) -> bool {
        !matches!(self, Self::Native(_))
    }

    pub(crate) fn into_record(self) -> Result<QuestionRecord, ShapeError> {
        match self {
            Self::Native(record) => Ok(record),
            Self::CriticActor(legacy) => Ok(QuestionRecord {
                ground_truth: legacy.ground_truth,
                rounds: vec![legacy.round_1_results, legacy.final_round_results],
                decision: None,
                recorded: None,
            }),
            Self::Staged(staged) => Ok(staged.into_record()),
            Self::Transcript(contexts, ground_truth) => {
                let responses: Vec<Vec<String>> = contexts
                    .into_iter()
                    .map(|messages| {
                        messages
                            .into_iter()
                            .filter(|m| m.role == Role::Assistant)
                            .map(|m| m.content)
                            .collect()
                    })
                    .collect();

                let expected = responses.first().map(Vec::len).unwrap_or(0);
                if expected == 0 {
                    return Err(ShapeError::EmptyTranscript);
                }
                if let Some((agent, r)) = responses
                    .iter()
                    .enumerate()
                    .find(|(_, r)| r.len() != expected)
                {
                    return Err(ShapeError::RaggedTranscript {
                        agent,
                        expected,
                        found: r.len(),
                    });
                }

                let rounds = (0..expected)
                    .map(|round| {
                        responses
                            .iter()
                            .map(|agent| AgentEntry::new(agent[round].clone()))
                            .collect()
                    })
                    .collect();

                Ok(QuestionRecord {
                    ground_truth,
                    rounds,
                    decision: None,
                    recorded: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedAnswer;

    #[test]
    fn test_score_entry_shapes() {
        let scalar: ScoreEntry = serde_json::from_str("7").unwrap();
        assert_eq!(scalar.confidence(), ConfidenceScore::Present(7.0));

        let rubric: ScoreEntry = serde_json::from_str(
            r#"{"logic_score": 8, "computation_score": 6, "critique": "ok", "verification_step": "x"}"#,
        )
        .unwrap();
        assert_eq!(rubric.confidence(), ConfidenceScore::Present(7.0));
    }

    #[test]
    fn test_agent_entry_without_score() {
        let entry: AgentEntry = serde_json::from_str(r#"{"solution": "\\boxed{3}"}"#).unwrap();
        assert_eq!(entry.confidence(), ConfidenceScore::Absent);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"solution":"\\boxed{3}"}"#);
    }

    #[test]
    fn test_transcript_conversion() {
        let json = r#####"[
            [[{"role":"user","content":"q"},{"role":"assistant","content":"\\boxed{1}"},
              {"role":"user","content":"again"},{"role":"assistant","content":"\\boxed{2}"}],
             [{"role":"user","content":"q"},{"role":"assistant","content":"\\boxed{3}"},
              {"role":"user","content":"again"},{"role":"assistant","content":"\\boxed{2}"}]],
            "#### 2"
        ]"#####;
        let stored: StoredRecord = serde_json::from_str(json).unwrap();
        assert!(stored.is_legacy());
        let record = stored.into_record().unwrap();
        assert_eq!(record.rounds.len(), 2);
        assert_eq!(record.rounds[0][1].solution, "\\boxed{3}");

        let ballots = record.final_ballots(&Extractor::default());
        assert_eq!(ballots.len(), 2);
        assert!(ballots
            .iter()
            .all(|b| b.answer == ExtractedAnswer::Value("2".into())));
    }

    #[test]
    fn test_ragged_transcript_rejected() {
        let json = r#####"[[[{"role":"assistant","content":"1"}],[]], "#### 1"]"#####;
        let stored: StoredRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            stored.into_record().unwrap_err(),
            ShapeError::RaggedTranscript {
                agent: 1,
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn test_critic_actor_conversion() {
        let json = r#####"{
            "ground_truth": "#### 4",
            "round_1_results": [{"solution": "\\boxed{4}", "score": {"logic_score": 9, "computation_score": 9}}],
            "final_round_results": [{"solution": "\\boxed{4}", "score": {"logic_score": 10, "computation_score": 8}}]
        }"#####;
        let stored: StoredRecord = serde_json::from_str(json).unwrap();
        let record = stored.into_record().unwrap();
        assert_eq!(record.rounds.len(), 2);
        assert_eq!(
            record.rounds[1][0].confidence(),
            ConfidenceScore::Present(9.0)
        );
    }

    #[test]
    fn test_staged_conversion() {
        let json = r#####"{
            "ground_truth": "Half of 36.\n#### 18",
            "final_decision": "18",
            "temp_decision": 17,
            "fallback_triggered": true,
            "recanted": true,
            "round_1": [
                {"role": "critic", "solution": "\\boxed{17}", "id": 1},
                {"role": "executor", "solution": "print(18)", "id": 0}
            ],
            "round_2_scores": {"0": [8, 9], "1": [3.5]},
            "round_3_finals": [
                {"answer": "18", "original_idx": 1},
                {"answer": "18", "full_text": "fixed: \\boxed{18}", "original_idx": 0}
            ],
            "voting_weights": {"18": 2.1}
        }"#####;
        let stored: StoredRecord = serde_json::from_str(json).unwrap();
        assert!(stored.is_legacy());
        let record = stored.into_record().unwrap();

        assert_eq!(record.rounds.len(), 2);
        assert_eq!(record.rounds[0][0].solution, "print(18)");
        assert_eq!(record.rounds[0][0].score, Some(ScoreEntry::Scalar(8.5)));
        assert_eq!(record.rounds[1][0].solution, "fixed: \\boxed{18}");
        assert_eq!(record.rounds[1][1].solution, "18");
        assert_eq!(record.rounds[1][1].score, Some(ScoreEntry::Scalar(3.5)));

        let recorded = record.recorded.unwrap();
        assert_eq!(recorded.voting_answer.as_deref(), Some("17"));
        assert_eq!(recorded.final_answer.as_deref(), Some("18"));
        assert!(recorded.fallback_triggered);
        assert!(recorded.recanted);
    }

    #[test]
    fn test_staged_without_finals_is_not_staged() {
        let json = r#####"{"ground_truth": "#### 1", "round_1": [{"solution": "1"}]}"#####;
        assert!(serde_json::from_str::<StoredRecord>(json).is_err());
    }
}
