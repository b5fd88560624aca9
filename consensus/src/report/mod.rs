//! Reports over stored runs: accuracy, debate dynamics, and hard-question filtering.

pub mod dynamics;
pub mod evaluation;

pub use dynamics::{analyze, CalibrationSplit, DebateDynamics, ScoreStats};
pub use evaluation::{
    evaluate, hard_problems, AgentAccuracy, Evaluation, QuestionEvaluation, RecordedSummary,
};
