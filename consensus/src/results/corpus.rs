//! Question corpora stored as JSON Lines.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use super::error::{ResultsError, ResultsResult};

/// One corpus problem: question text and its reference solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub question: String,
    /// Reference solution, ending with a `#### <number>` line.
    pub answer: String,
}

/// Read a JSONL corpus. Blank lines are skipped; any other bad line is an error.
pub fn load_corpus(path: impl AsRef<Path>) -> ResultsResult<Vec<Problem>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ResultsError::io(path, e))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Problem>(line).map_err(|e| ResultsError::CorpusLine {
                path: path.to_path_buf(),
                line: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Write problems as JSONL, one object per line.
pub fn write_corpus(path: impl AsRef<Path>, problems: &[Problem]) -> ResultsResult<()> {
    let path = path.as_ref();
    let mut file = std::fs::File::create(path).map_err(|e| ResultsError::io(path, e))?;
    for problem in problems {
        let line = serde_json::to_string(problem)?;
        writeln!(file, "{}", line).map_err(|e| ResultsError::io(path, e))?;
    }
    Ok(())
}
