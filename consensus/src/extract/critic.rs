//! Critic output parsing: confidence scores attached to agent solutions.
//!
//! Critics answer in loosely structured text or JSON. Every parser here is
//! total: unparseable output yields [`ConfidenceScore::Absent`], never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lowest score a critic may assign.
pub const MIN_CRITIC_SCORE: f64 = 1.0;
/// Highest score a critic may assign.
pub const MAX_CRITIC_SCORE: f64 = 10.0;

static CONFIDENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence\s*score\s*:\s*(\d+(?:\.\d+)?)")
        .expect("CONFIDENCE_LINE_RE regex should compile")
});

static EXPLANATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)explanation\s*:\s*(.*)").expect("EXPLANATION_RE regex should compile")
});

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*([\[{].*?[\]}])\s*```").expect("FENCED_JSON_RE regex should compile")
});

static FIRST_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?").expect("FIRST_NUMBER_RE regex should compile")
});

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("TRAILING_COMMA_RE regex should compile"));

/// Optional confidence rating for a solution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum ConfidenceScore {
    Present(f64),
    #[default]
    Absent,
}

impl ConfidenceScore {
    /// The score, or `neutral` when absent.
    pub fn value_or(self, neutral: f64) -> f64 {
        match self {
            Self::Present(v) => v,
            Self::Absent => neutral,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl From<Option<f64>> for ConfidenceScore {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Present(v),
            _ => Self::Absent,
        }
    }
}

impl From<ConfidenceScore> for Option<f64> {
    fn from(value: ConfidenceScore) -> Self {
        match value {
            ConfidenceScore::Present(v) => Some(v),
            ConfidenceScore::Absent => None,
        }
    }
}

impl std::fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present(v) => write!(f, "{}", v),
            Self::Absent => write!(f, "n/a"),
        }
    }
}

/// One critic judgement about one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticAssessment {
    pub score: ConfidenceScore,
    pub explanation: String,
}

/// One blind-review rubric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricReview {
    /// Anonymized candidate label ("A", "B", ...).
    pub candidate: String,
    pub final_score: ConfidenceScore,
    pub critique: String,
}

fn clamp_score(v: f64) -> f64 {
    v.clamp(MIN_CRITIC_SCORE, MAX_CRITIC_SCORE)
}

/// Numeric value of a loosely typed JSON field.
fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => FIRST_NUMBER_RE
            .find(s)
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    }
}

/// Parse a `Confidence Score: N` line, clamped to the critic range.
pub fn parse_confidence_line(text: &str) -> ConfidenceScore {
    CONFIDENCE_LINE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|v| ConfidenceScore::Present(clamp_score(v)))
        .unwrap_or(ConfidenceScore::Absent)
}

/// Text after `Explanation:`, or the whole trimmed text.
pub fn parse_explanation(text: &str) -> String {
    EXPLANATION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// Parse a once-per-round critic that scored every agent.
///
/// Expects `{"agents": [{"id": 0, "score": 7, "explanation": "..."}, ...]}`
/// somewhere between the first `{` and the last `}`. A `flaw` field is
/// accepted in place of `explanation`. Agents the critic skipped keep an
/// absent score and the raw critic text as their explanation.
pub fn parse_multi_critic(text: &str, agents: usize) -> Vec<CriticAssessment> {
    let raw = text.trim().to_string();
    let mut out: Vec<CriticAssessment> = (0..agents)
        .map(|_| CriticAssessment {
            score: ConfidenceScore::Absent,
            explanation: raw.clone(),
        })
        .collect();

    let body = match (text.find('{'), text.rfind('}')) {
        (Some(first), Some(last)) if last > first => &text[first..=last],
        _ => return out,
    };

    let Some(parsed) = parse_lenient_json(body) else {
        return out;
    };

    let Some(items) = parsed.get("agents").and_then(|a| a.as_array()) else {
        return out;
    };

    for item in items {
        let Some(idx) = item.get("id").and_then(json_number) else {
            continue;
        };
        if idx < 0.0 || idx.fract() != 0.0 || idx as usize >= agents {
            continue;
        }
        let idx = idx as usize;

        if let Some(score) = item.get("score").and_then(json_number) {
            out[idx].score = ConfidenceScore::Present(clamp_score(score));
        }

        let explanation = item
            .get("explanation")
            .or_else(|| item.get("flaw"))
            .and_then(|e| e.as_str())
            .map(str::trim)
            .unwrap_or("");
        if !explanation.is_empty() {
            out[idx].explanation = explanation.to_string();
        }
    }

    out
}

/// Parse a blind-review rubric: a list of `{candidate, final_score, critique}`.
///
/// Looks for a fenced `json` block first, then a raw list, then a raw object
/// (wrapped into a one-element list). Returns an empty list when nothing parses.
pub fn parse_rubric(text: &str) -> Vec<RubricReview> {
    let Some(json) = locate_rubric_json(text) else {
        return Vec::new();
    };

    let Some(value) = parse_lenient_json(&json) else {
        return Vec::new();
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let candidate = item.get("candidate")?.as_str()?.trim().to_string();
            let final_score = item
                .get("final_score")
                .and_then(json_number)
                .map(ConfidenceScore::Present)
                .unwrap_or(ConfidenceScore::Absent);
            let critique = item
                .get("critique")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string();
            Some(RubricReview {
                candidate,
                final_score,
                critique,
            })
        })
        .collect()
}

fn locate_rubric_json(text: &str) -> Option<String> {
    if let Some(m) = FENCED_JSON_RE.captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }
    if let (Some(first), Some(last)) = (text.find('['), text.rfind(']')) {
        if last > first {
            return Some(text[first..=last].to_string());
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(first), Some(last)) if last > first => Some(text[first..=last].to_string()),
        _ => None,
    }
}

/// Parse as-is, and only on failure retry with comments and trailing commas removed.
fn parse_lenient_json(raw: &str) -> Option<serde_json::Value> {
    serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&sanitize_json(raw)))
        .ok()
}

/// Drop `//` comments outside string literals, then trailing commas.
fn sanitize_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    TRAILING_COMMA_RE.replace_all(&out, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_line() {
        assert_eq!(
            parse_confidence_line("Confidence Score: 8\nExplanation: fine"),
            ConfidenceScore::Present(8.0)
        );
        assert_eq!(
            parse_confidence_line("confidence score:15"),
            ConfidenceScore::Present(10.0)
        );
        assert_eq!(parse_confidence_line("no score"), ConfidenceScore::Absent);
    }

    #[test]
    fn test_explanation() {
        assert_eq!(
            parse_explanation("Confidence Score: 3\nExplanation: wrong rate used"),
            "wrong rate used"
        );
        assert_eq!(parse_explanation("  bare text "), "bare text");
    }

    #[test]
    fn test_multi_critic_parses_all_agents() {
        let text = r#"Here you go:
{"agents":[{"id":0,"score":9,"flaw":"none"},{"id":1,"score":2,"explanation":"sign error"},{"id":2,"score":"7"}]}"#;
        let parsed = parse_multi_critic(text, 3);
        assert_eq!(parsed[0].score, ConfidenceScore::Present(9.0));
        assert_eq!(parsed[0].explanation, "none");
        assert_eq!(parsed[1].score, ConfidenceScore::Present(2.0));
        assert_eq!(parsed[1].explanation, "sign error");
        assert_eq!(parsed[2].score, ConfidenceScore::Present(7.0));
    }

    #[test]
    fn test_multi_critic_ignores_bad_ids_and_clamps() {
        let text = r#"{"agents":[{"id":5,"score":9},{"id":0,"score":42},]}"#;
        let parsed = parse_multi_critic(text, 2);
        assert_eq!(parsed[0].score, ConfidenceScore::Present(10.0));
        assert_eq!(parsed[1].score, ConfidenceScore::Absent);
    }

    #[test]
    fn test_multi_critic_keeps_slashes_in_strings() {
        let text = r#"{"agents":[{"id":0,"score":9,"explanation":"matches https://example.com"},{"id":1,"score":3,"explanation":"1//2 is not 2"}]}"#;
        let parsed = parse_multi_critic(text, 2);
        assert_eq!(parsed[0].score, ConfidenceScore::Present(9.0));
        assert_eq!(parsed[0].explanation, "matches https://example.com");
        assert_eq!(parsed[1].score, ConfidenceScore::Present(3.0));
        assert_eq!(parsed[1].explanation, "1//2 is not 2");
    }

    #[test]
    fn test_multi_critic_strips_comments_outside_strings() {
        let text = "{\"agents\": [\n  {\"id\": 0, \"score\": 6, \"flaw\": \"see http://x.y\"}, // first\n  {\"id\": 1, \"score\": 8,}, // trailing\n]}";
        let parsed = parse_multi_critic(text, 2);
        assert_eq!(parsed[0].score, ConfidenceScore::Present(6.0));
        assert_eq!(parsed[0].explanation, "see http://x.y");
        assert_eq!(parsed[1].score, ConfidenceScore::Present(8.0));
    }

    #[test]
    fn test_multi_critic_garbage() {
        let parsed = parse_multi_critic("I refuse to grade.", 2);
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|a| a.score == ConfidenceScore::Absent));
        assert_eq!(parsed[0].explanation, "I refuse to grade.");
    }

    #[test]
    fn test_rubric_fenced_list() {
        let text = "Reviews:\n```json\n[\n  {\"candidate\": \"A\", \"final_score\": 8.5, \"critique\": \"ok\"}, // best\n  {\"candidate\": \"B\", \"final_score\": 3, \"critique\": \"bad\"},\n]\n```";
        let parsed = parse_rubric(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].candidate, "A");
        assert_eq!(parsed[0].final_score, ConfidenceScore::Present(8.5));
        assert_eq!(parsed[1].critique, "bad");
    }

    #[test]
    fn test_rubric_single_object() {
        let parsed = parse_rubric(r#"{"candidate": "C", "final_score": "6/10"}"#);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].final_score, ConfidenceScore::Present(6.0));
    }

    #[test]
    fn test_rubric_garbage() {
        assert!(parse_rubric("nothing structured").is_empty());
    }

    #[test]
    fn test_confidence_serde() {
        assert_eq!(
            serde_json::to_string(&ConfidenceScore::Present(7.0)).unwrap(),
            "7.0"
        );
        assert_eq!(
            serde_json::to_string(&ConfidenceScore::Absent).unwrap(),
            "null"
        );
        let parsed: ConfidenceScore = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, ConfidenceScore::Absent);
        assert_eq!(ConfidenceScore::Absent.value_or(5.0), 5.0);
    }
}
