mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use cli::{AnalyzeArgs, Cli, Command, CompareArgs, EvaluateArgs, FilterHardArgs, RunArgs};
use consensus::compare::{compare_runs, format_comparison};
use consensus::debate::{DebateConfig, DebateRunner, EndpointConfig, OpenAiClient};
use consensus::report::{analyze, evaluate, hard_problems};
use consensus::results::{load_corpus, write_corpus, LoadReport};
use consensus::{ConsensusConfig, ConsensusEngine, ResultSet};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ConsensusConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConsensusConfig::default(),
    };
    let engine = ConsensusEngine::new(config);

    match cli.command {
        Command::Run(args) => run(args, engine).await,
        Command::Evaluate(args) => evaluate_cmd(args, &engine),
        Command::Compare(args) => compare_cmd(args, &engine),
        Command::Analyze(args) => analyze_cmd(args, &engine),
        Command::FilterHard(args) => filter_hard(args, &engine),
    }
}

fn load_results(path: &Path) -> Result<(ResultSet, LoadReport)> {
    let (results, report) =
        ResultSet::load(path).with_context(|| format!("loading results {}", path.display()))?;
    if !report.is_clean() {
        warn!(
            path = %path.display(),
            malformed = report.malformed.len(),
            "some entries were skipped"
        );
    }
    Ok((results, report))
}

async fn run(args: RunArgs, engine: ConsensusEngine) -> Result<()> {
    let mut problems = load_corpus(&args.corpus)
        .with_context(|| format!("loading corpus {}", args.corpus.display()))?;
    if let Some(limit) = args.limit {
        problems.truncate(limit);
    }

    let mut endpoint = EndpointConfig::default();
    if let Some(url) = args.api_url {
        endpoint.url = url;
    }
    if let Some(model) = args.model {
        endpoint.model = model;
    }
    if let Some(temperature) = args.temperature {
        endpoint.temperature = temperature;
    }
    if let Some(max_tokens) = args.max_tokens {
        endpoint.max_tokens = max_tokens;
    }

    info!(
        url = %endpoint.url,
        model = %endpoint.model,
        questions = problems.len(),
        agents = args.agents,
        rounds = args.rounds,
        critic = ?args.critic,
        "Debate run starting"
    );

    let client = OpenAiClient::new(endpoint).context("building completion client")?;
    let debate = DebateConfig {
        agents: args.agents,
        rounds: args.rounds,
        critic: args.critic.into(),
        restart_threshold: args.restart_threshold,
        early_stop_threshold: args.early_stop_threshold,
        max_concurrent_questions: args.workers,
    };
    let runner = DebateRunner::new(Arc::new(client), engine, debate)?;

    let (mut results, report) = ResultSet::load_or_default(&args.output)
        .with_context(|| format!("loading results {}", args.output.display()))?;
    if !report.is_clean() {
        warn!(
            path = %args.output.display(),
            unreadable = report.malformed.len(),
            "unreadable entries are kept as-is and not debated again"
        );
    }
    let started = std::time::Instant::now();
    let summary = runner
        .run_corpus(&problems, &mut results, &args.output)
        .await?;

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        total_secs = elapsed,
        per_question_secs = elapsed / summary.completed.max(1) as f64,
        output = %args.output.display(),
        "Debate run finished"
    );
    Ok(())
}

fn evaluate_cmd(args: EvaluateArgs, engine: &ConsensusEngine) -> Result<()> {
    let (results, report) = load_results(&args.results)?;
    let evaluation = evaluate(&results, &report, engine);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!("{}", evaluation.format_report());
    }
    Ok(())
}

fn compare_cmd(args: CompareArgs, engine: &ConsensusEngine) -> Result<()> {
    let (baseline, baseline_report) = load_results(&args.baseline)?;
    let (experimental, experimental_report) = load_results(&args.experimental)?;
    let comparison = compare_runs(
        &engine.outcomes(&baseline, &baseline_report),
        &engine.outcomes(&experimental, &experimental_report),
    );
    println!("{}", format_comparison(&comparison));
    Ok(())
}

fn analyze_cmd(args: AnalyzeArgs, engine: &ConsensusEngine) -> Result<()> {
    let (results, _) = load_results(&args.results)?;
    println!("{}", analyze(&results, engine).format_report());
    Ok(())
}

fn filter_hard(args: FilterHardArgs, engine: &ConsensusEngine) -> Result<()> {
    let (results, report) = load_results(&args.results)?;
    let corpus = match &args.corpus {
        Some(path) => load_corpus(path)
            .with_context(|| format!("loading corpus {}", path.display()))?,
        None => Vec::new(),
    };

    let evaluation = evaluate(&results, &report, engine);
    let hard = hard_problems(&evaluation, &results, &corpus);
    write_corpus(&args.output, &hard)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        accuracy = evaluation.accuracy,
        std_error = evaluation.std_error,
        hard = hard.len(),
        output = %args.output.display(),
        "Hard questions written"
    );
    Ok(())
}
