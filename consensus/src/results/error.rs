//! Errors raised while reading or writing result files.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for result-file operations
pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(Debug, Error)]
pub enum ResultsError {
    /// File could not be read or written
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Top level of a results file is not valid JSON
    #[error("Invalid results JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Top level parsed but is not a question-keyed object
    #[error("Results file {path} must contain a JSON object keyed by question")]
    NotAnObject { path: PathBuf },

    /// A corpus line failed to parse
    #[error("Corpus {path} line {line}: {message}")]
    CorpusLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResultsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
