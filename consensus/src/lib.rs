//! Answer consensus for multi-agent math debates.
//!
//! This library provides:
//! - Answer extraction from free-form agent responses and critic outputs
//! - Ballot aggregation: majority, confidence-weighted, and gated votes
//! - Float-tolerant scoring against `#### <number>` ground truths
//! - A persisted result format that also reads older experiment files
//! - Cross-run comparison, accuracy evaluation, and debate-dynamics reports
//! - A debate runner over any OpenAI-compatible completion endpoint
//!
//! # Flow
//!
//! ```text
//! Problem ──► DebateRunner ──► QuestionRecord (rounds × agents)
//!                                   │
//!                       Extractor ──┤──► Ballot ──► Aggregator ──► Decision
//!                                   │                                │
//!                                   └──────────── Scorer ◄───────────┘
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod compare;
pub mod config;
pub mod debate;
pub mod engine;
pub mod extract;
pub mod message;
pub mod report;
pub mod results;
pub mod scoring;
pub mod voting;

pub use compare::{compare_runs, format_comparison, QuestionOutcome, RunComparison};
pub use config::{ConfigError, ConsensusConfig};
pub use engine::ConsensusEngine;
pub use extract::{ConfidenceScore, ExtractedAnswer, Extractor, ExtractorConfig};
pub use message::{ChatMessage, Role};
pub use results::{LoadReport, Problem, QuestionRecord, ResultSet, ResultsError};
pub use scoring::{Scorer, ScorerConfig, Verdict};
pub use voting::{Aggregator, AggregatorConfig, Ballot, Decision, VotingStrategy};
