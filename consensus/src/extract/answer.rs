//! Normalized answer tokens.

use serde::{Deserialize, Serialize};

/// A normalized numeric answer, or the absence of one.
///
/// Serialized as a JSON string, or `null` for [`ExtractedAnswer::NoAnswer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ExtractedAnswer {
    /// Literal digits (optional leading `-`, at most one decimal point).
    Value(String),
    /// No parseable number was found.
    NoAnswer,
}

impl ExtractedAnswer {
    /// Wrap a payload, normalizing it first. Unparseable payloads become `NoAnswer`.
    pub fn from_payload(payload: &str) -> Self {
        normalize_numeric(payload)
            .map(Self::Value)
            .unwrap_or(Self::NoAnswer)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoAnswer => None,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Numeric value of the token.
    pub fn to_f64(&self) -> Option<f64> {
        self.as_str().and_then(|v| v.parse::<f64>().ok())
    }
}

impl From<Option<String>> for ExtractedAnswer {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::from_payload(&v),
            None => Self::NoAnswer,
        }
    }
}

impl From<ExtractedAnswer> for Option<String> {
    fn from(value: ExtractedAnswer) -> Self {
        match value {
            ExtractedAnswer::Value(v) => Some(v),
            ExtractedAnswer::NoAnswer => None,
        }
    }
}

impl std::fmt::Display for ExtractedAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::NoAnswer => write!(f, "no answer"),
        }
    }
}

/// Reduce a matched payload to its numeric token.
///
/// Keeps the digits and the first decimal point. A `-` survives only when it
/// appears before the first digit. Currency symbols, thousands separators,
/// units, and further decimal points are dropped. Returns `None` when the
/// payload holds no digit.
pub fn normalize_numeric(payload: &str) -> Option<String> {
    let mut out = String::with_capacity(payload.len());
    let mut negative = false;
    let mut seen_digit = false;
    let mut seen_point = false;

    for c in payload.chars() {
        match c {
            '0'..='9' => {
                seen_digit = true;
                out.push(c);
            }
            '.' if !seen_point => {
                seen_point = true;
                out.push(c);
            }
            '-' if !seen_digit && out.is_empty() => negative = true,
            _ => {}
        }
    }

    if !seen_digit {
        return None;
    }

    // "12." is the same token as "12"
    if out.ends_with('.') {
        out.pop();
    }
    if negative {
        out.insert(0, '-');
    }
    Some(out)
}
