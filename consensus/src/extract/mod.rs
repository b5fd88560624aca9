//! Answer extraction: raw agent text to normalized numeric tokens.
//!
//! # Flow
//!
//! ```text
//! RawResponse ──► Extractor ──► ExtractedAnswer ("42" | no answer)
//! Critic text ──► critic::* ──► ConfidenceScore (Present | Absent)
//! Ground truth ─► parse_ground_truth ──► normalized reference token
//! ```

pub mod answer;
pub mod critic;
pub mod extractor;

pub use answer::{normalize_numeric, ExtractedAnswer};
pub use critic::{
    parse_confidence_line, parse_explanation, parse_multi_critic, parse_rubric, ConfidenceScore,
    CriticAssessment, RubricReview,
};
pub use extractor::{parse_ground_truth, Extraction, ExtractionMethod, Extractor, ExtractorConfig};
