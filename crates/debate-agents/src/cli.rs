//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use consensus::debate::CriticMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Consensus settings (TOML): extractor, aggregator, and scorer sections
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Debate every question of a corpus, resuming from an existing results file
    Run(RunArgs),
    /// Report accuracy of a results file
    Evaluate(EvaluateArgs),
    /// Compare two results files question by question
    Compare(CompareArgs),
    /// Report consensus, answer changes, and critic calibration
    Analyze(AnalyzeArgs),
    /// Write the incorrectly answered questions as a new JSONL corpus
    FilterHard(FilterHardArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSONL corpus of {question, answer} records
    #[arg(long)]
    pub corpus: PathBuf,

    /// Results file; existing entries are kept and skipped
    #[arg(long)]
    pub output: PathBuf,

    /// Only debate the first N corpus questions
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 3)]
    pub agents: usize,

    #[arg(long, default_value_t = 3)]
    pub rounds: usize,

    /// How each round is scored before the next one
    #[arg(long, value_enum, default_value_t = CriticArg::Off)]
    pub critic: CriticArg,

    /// Restart all agents when every critic score falls below this
    #[arg(long)]
    pub restart_threshold: Option<f64>,

    /// Stop when all agents agree and every critic score reaches this
    #[arg(long)]
    pub early_stop_threshold: Option<f64>,

    /// Questions debated concurrently
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Completion endpoint base URL (overrides DEBATE_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Model name (overrides DEBATE_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,
}

/// Round scoring selected via `--critic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CriticArg {
    /// Plain debate, no scores
    Off,
    /// One `Confidence Score:` critic call per agent
    PerAgent,
    /// One JSON critic call scoring every agent
    Joint,
    /// Agents review each other's anonymized solutions with a rubric
    BlindReview,
}

impl From<CriticArg> for CriticMode {
    fn from(arg: CriticArg) -> Self {
        match arg {
            CriticArg::Off => Self::Off,
            CriticArg::PerAgent => Self::PerAgent,
            CriticArg::Joint => Self::Joint,
            CriticArg::BlindReview => Self::BlindReview,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub results: PathBuf,

    /// Print the evaluation as JSON instead of markdown
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[arg(long)]
    pub baseline: PathBuf,

    #[arg(long)]
    pub experimental: PathBuf,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(long)]
    pub results: PathBuf,
}

#[derive(Args, Debug)]
pub struct FilterHardArgs {
    #[arg(long)]
    pub results: PathBuf,

    /// Source corpus; its full records are copied when a question matches
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Destination JSONL file
    #[arg(long)]
    pub output: PathBuf,
}
