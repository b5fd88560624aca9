//! Final-answer extraction from free-text agent responses.
//!
//! Strategy, in order:
//! 1. If the response carries a code execution section, search only the text
//!    after its last occurrence (marker first, then trailing number).
//! 2. The last `\boxed{...}` marker whose payload holds a number.
//! 3. The last number-shaped token anywhere in the text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::answer::{normalize_numeric, ExtractedAnswer};

/// `\boxed{payload}` with a brace-free payload.
static BOXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\boxed\{([^{}]*)\}").expect("BOXED_RE regex should compile")
});

/// Number-shaped token: optional sign, optional thousands groups, optional decimals.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-)?(\d+(?:,\d{3})*(?:\.\d+)?)").expect("NUMBER_RE regex should compile")
});

/// Ground-truth delimiter used by the GSM corpus.
const GROUND_TRUTH_DELIMITER: &str = "####";

/// How an answer was located in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Found inside a `\boxed{}` marker.
    Marker,
    /// Found in a code execution output section.
    ExecutionOutput,
    /// Last number in the text.
    TrailingNumber,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marker => write!(f, "marker"),
            Self::ExecutionOutput => write!(f, "execution_output"),
            Self::TrailingNumber => write!(f, "trailing_number"),
        }
    }
}

/// A located answer together with the method that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub answer: String,
    pub method: ExtractionMethod,
}

/// Extractor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Header that introduces captured program output. `None` disables the section search.
    pub execution_output_marker: Option<String>,
    /// Fall back to the last number when no marker is present.
    pub fallback_to_last_number: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            execution_output_marker: Some("Code Execution Output:".to_string()),
            fallback_to_last_number: true,
        }
    }
}

/// Maps a raw response to an [`ExtractedAnswer`]. Total and deterministic.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the final answer, or `NoAnswer`.
    pub fn extract(&self, text: &str) -> ExtractedAnswer {
        match self.extract_detailed(text) {
            Some(extraction) => ExtractedAnswer::Value(extraction.answer),
            None => ExtractedAnswer::NoAnswer,
        }
    }

    /// Extract the final answer along with how it was found.
    pub fn extract_detailed(&self, text: &str) -> Option<Extraction> {
        if let Some(section) = self.execution_section(text) {
            let found = last_marker_payload(section).or_else(|| last_number(section));
            if let Some(answer) = found {
                return Some(Extraction {
                    answer,
                    method: ExtractionMethod::ExecutionOutput,
                });
            }
        }

        if let Some(answer) = last_marker_payload(text) {
            return Some(Extraction {
                answer,
                method: ExtractionMethod::Marker,
            });
        }

        if self.config.fallback_to_last_number {
            return last_number(text).map(|answer| Extraction {
                answer,
                method: ExtractionMethod::TrailingNumber,
            });
        }

        None
    }

    fn execution_section<'a>(&self, text: &'a str) -> Option<&'a str> {
        let marker = self.config.execution_output_marker.as_deref()?;
        if marker.is_empty() {
            return None;
        }
        text.rfind(marker).map(|idx| &text[idx + marker.len()..])
    }
}

/// Payload of the last marker that normalizes to a number.
///
/// Earlier markers are intermediate work; a later marker always wins, and an
/// empty or non-numeric later marker defers to the one before it.
fn last_marker_payload(text: &str) -> Option<String> {
    let payloads: Vec<&str> = BOXED_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    payloads.into_iter().rev().find_map(normalize_numeric)
}

/// Last number-shaped token in the text.
fn last_number(text: &str) -> Option<String> {
    let caps = NUMBER_RE.captures_iter(text).last()?;
    let whole = caps.get(0)?;
    let digits = caps.get(2)?.as_str();

    // A '-' glued to a preceding digit, letter, or closing bracket is an operator.
    let signed = caps.get(1).is_some()
        && !text[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == ')' || c == ']');

    let token = if signed {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };
    normalize_numeric(&token)
}

/// Parse a ground-truth string in the `#### <number>` convention.
///
/// Uses the last delimiter and the first number after it; commas are removed.
/// When `lenient` is set and no delimiter exists, the last number of the
/// string is used instead. Returns `None` when nothing parses.
pub fn parse_ground_truth(text: &str, lenient: bool) -> Option<String> {
    match text.rfind(GROUND_TRUTH_DELIMITER) {
        Some(idx) => {
            let tail = &text[idx + GROUND_TRUTH_DELIMITER.len()..];
            let caps = NUMBER_RE.captures(tail)?;
            let sign = if caps.get(1).is_some() { "-" } else { "" };
            let digits = caps.get(2)?.as_str();
            normalize_numeric(&format!("{}{}", sign, digits))
        }
        None if lenient => last_number(text),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ExtractedAnswer {
        Extractor::default().extract(text)
    }

    fn value(v: &str) -> ExtractedAnswer {
        ExtractedAnswer::Value(v.to_string())
    }

    #[test]
    fn test_marker_in_prose() {
        assert_eq!(
            extract("First 3 + 4 = 7, then doubled. The answer is \\boxed{42}. Done in 2 steps."),
            value("42")
        );
    }

    #[test]
    fn test_last_marker_wins() {
        assert_eq!(
            extract("Initially \\boxed{10}. On reflection, \\boxed{12}."),
            value("12")
        );
    }

    #[test]
    fn test_empty_last_marker_defers_to_previous() {
        assert_eq!(extract("\\boxed{8} and later \\boxed{}"), value("8"));
        assert_eq!(extract("\\boxed{8} and later \\boxed{answer}"), value("8"));
    }

    #[test]
    fn test_marker_payload_cleaned_after_match() {
        assert_eq!(extract("Total cost: \\boxed{$1,200}"), value("1200"));
        assert_eq!(extract("\\boxed{18 dollars}"), value("18"));
    }

    #[test]
    fn test_trailing_number_fallback() {
        assert_eq!(extract("She ends up with 17 apples."), value("17"));
        assert_eq!(extract("Difference is 3.75 meters"), value("3.75"));
        assert_eq!(extract("It totals 1,200 units"), value("1200"));
    }

    #[test]
    fn test_fallback_sign_handling() {
        assert_eq!(extract("temperature drops to -4"), value("-4"));
        assert_eq!(extract("compute 5-3"), value("3"));
    }

    #[test]
    fn test_no_answer() {
        assert_eq!(extract(""), ExtractedAnswer::NoAnswer);
        assert_eq!(extract("I cannot solve this."), ExtractedAnswer::NoAnswer);
        assert_eq!(extract("\\boxed{}"), ExtractedAnswer::NoAnswer);
    }

    #[test]
    fn test_fallback_disabled() {
        let extractor = Extractor::new(ExtractorConfig {
            fallback_to_last_number: false,
            ..Default::default()
        });
        assert_eq!(extractor.extract("about 17 apples"), ExtractedAnswer::NoAnswer);
        assert_eq!(extractor.extract("\\boxed{17}"), value("17"));
    }

    #[test]
    fn test_execution_output_section_preferred() {
        let text = "```python\nprint(40 + 2)\n```\nI expect \\boxed{41}.\n\nCode Execution Output:\n42\n";
        let found = Extractor::default().extract_detailed(text).unwrap();
        assert_eq!(found.answer, "42");
        assert_eq!(found.method, ExtractionMethod::ExecutionOutput);
    }

    #[test]
    fn test_execution_output_without_number_falls_through() {
        let text = "\\boxed{9}\nCode Execution Output:\nnothing printed";
        let found = Extractor::default().extract_detailed(text).unwrap();
        assert_eq!(found.answer, "9");
        assert_eq!(found.method, ExtractionMethod::Marker);
    }

    #[test]
    fn test_idempotent() {
        let text = "Steps 1, 2, then \\boxed{5}; some trailing 99";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_ground_truth() {
        assert_eq!(
            parse_ground_truth("She pays 2*600 = 1200\n#### 1,200", false).as_deref(),
            Some("1200")
        );
        assert_eq!(parse_ground_truth("#### -7", false).as_deref(), Some("-7"));
        assert_eq!(parse_ground_truth("no delimiter 12", false), None);
        assert_eq!(
            parse_ground_truth("no delimiter 12", true).as_deref(),
            Some("12")
        );
        assert_eq!(parse_ground_truth("#### unknown", false), None);
    }

    #[test]
    fn test_method_display() {
        assert_eq!(ExtractionMethod::Marker.to_string(), "marker");
        assert_eq!(
            ExtractionMethod::TrailingNumber.to_string(),
            "trailing_number"
        );
    }
}
