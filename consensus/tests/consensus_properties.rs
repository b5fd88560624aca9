//! End-to-end properties of extraction, voting, and scoring.

use consensus::extract::{ExtractedAnswer, Extractor};
use consensus::voting::{Aggregator, AggregatorConfig, Ballot, VotingStrategy};
use consensus::{ConfidenceScore, ConsensusConfig, ConsensusEngine, Scorer};

fn value(v: &str) -> ExtractedAnswer {
    ExtractedAnswer::Value(v.to_string())
}

fn scored(agent: usize, answer: &str, confidence: f64) -> Ballot {
    Ballot::new(agent, value(answer), ConfidenceScore::Present(confidence))
}

#[test]
fn test_marker_wins_regardless_of_prose() {
    let extractor = Extractor::default();
    for text in [
        "\\boxed{42}",
        "After 3 steps and 7 checks the total is \\boxed{42}.",
        "\\boxed{42} and then I rambled about 99 other things",
        "```python\nprint(6*7)\n```\nSo the answer is \\boxed{42}",
    ] {
        assert_eq!(extractor.extract(text), value("42"), "input: {text}");
    }
}

#[test]
fn test_last_marker_counts() {
    let extractor = Extractor::default();
    let text = "First guess \\boxed{10}. Wait, recheck: \\boxed{12}. Final: \\boxed{14}";
    assert_eq!(extractor.extract(text), value("14"));
}

#[test]
fn test_trailing_number_fallback() {
    assert_eq!(
        Extractor::default().extract("She has 17 apples."),
        value("17")
    );
}

#[test]
fn test_no_digits_is_no_answer() {
    let extractor = Extractor::default();
    assert_eq!(extractor.extract(""), ExtractedAnswer::NoAnswer);
    assert_eq!(extractor.extract("I cannot solve this."), ExtractedAnswer::NoAnswer);
    assert_eq!(extractor.extract("\\boxed{}"), ExtractedAnswer::NoAnswer);
}

#[test]
fn test_currency_payload_cleaned() {
    assert_eq!(Extractor::default().extract("Total: \\boxed{$1,200}"), value("1200"));
}

#[test]
fn test_extraction_idempotent() {
    let extractor = Extractor::default();
    let text = "We compute 3 + 4 = 7, so \\boxed{7.50} dollars";
    assert_eq!(extractor.extract(text), extractor.extract(text));
}

#[test]
fn test_unweighted_majority() {
    let ballots = vec![
        Ballot::unscored(0, value("5")),
        Ballot::unscored(1, value("5")),
        Ballot::unscored(2, value("7")),
    ];
    assert_eq!(Aggregator::default().decide(&ballots).answer, value("5"));
}

#[test]
fn test_empty_ballots_no_answer() {
    let decision = Aggregator::default().decide(&[]);
    assert_eq!(decision.answer, ExtractedAnswer::NoAnswer);
    assert!(decision.tally.is_empty());
}

#[test]
fn test_weighted_and_majority_disagree_on_fixture() {
    let ballots = vec![
        scored(0, "5", 9.0),
        scored(1, "5", 9.0),
        scored(2, "7", 1.0),
        scored(3, "7", 1.0),
        scored(4, "7", 1.0),
    ];
    let majority = Aggregator::default();
    let weighted = Aggregator::new(AggregatorConfig {
        strategy: VotingStrategy::WeightedSum,
        ..Default::default()
    });

    for _ in 0..3 {
        assert_eq!(majority.decide(&ballots).answer, value("7"));
        assert_eq!(weighted.decide(&ballots).answer, value("5"));
    }
}

#[test]
fn test_decision_keeps_ballots() {
    let ballots = vec![scored(0, "1", 3.0), Ballot::unscored(1, ExtractedAnswer::NoAnswer)];
    let decision = Aggregator::default().decide(&ballots);
    assert_eq!(decision.ballots, ballots);
}

#[test]
fn test_scorer_comma_and_no_answer() {
    let scorer = Scorer::default();
    assert!(scorer.score(&value("1200"), "#### 1,200").correct);
    assert!(!scorer.score(&ExtractedAnswer::NoAnswer, "#### 1,200").correct);
}

#[test]
fn test_engine_from_toml_config() {
    let config = ConsensusConfig::from_toml_str(
        r#"
        [aggregator]
        strategy = { kind = "weighted_sum" }
        "#,
    )
    .unwrap();
    let engine = ConsensusEngine::new(config);
    let decision = engine.aggregator().decide(&[
        scored(0, "5", 9.0),
        scored(1, "7", 2.0),
        scored(2, "7", 2.0),
    ]);
    assert_eq!(decision.answer, value("5"));
    assert!(engine.score(&decision, "#### 5").correct);
}

#[test]
fn test_extreme_exponential_decision_survives_reload() {
    use consensus::results::{AgentEntry, QuestionRecord, ScoreEntry};
    use consensus::ResultSet;

    let aggregator = Aggregator::new(AggregatorConfig {
        strategy: VotingStrategy::Exponential { alpha: 1e6 },
        ..Default::default()
    });
    let decision = aggregator.decide(&[scored(0, "5", 9.0), scored(1, "6", 8.0)]);
    assert_eq!(decision.answer, value("5"));

    let mut record = QuestionRecord::new("#### 5");
    record.rounds.push(vec![
        AgentEntry::new("\\boxed{5}").with_score(ScoreEntry::Scalar(9.0)),
        AgentEntry::new("\\boxed{6}").with_score(ScoreEntry::Scalar(8.0)),
    ]);
    record.decision = Some(decision);
    let mut results = ResultSet::new();
    results.insert("q", record);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");
    results.save(&path).unwrap();
    let (reloaded, report) = ResultSet::load(&path).unwrap();
    assert!(report.is_clean());
    assert_eq!(reloaded, results);
}
