//! Question-keyed result sets.
//!
//! Loading accepts the native record and the legacy shapes; entries that
//! match none of them are reported rather than failing the whole file.
//! Legacy and unreadable entries keep their original JSON and are written
//! back as read, so resaving a file never drops or rewrites them.
//! Saving writes a sibling `*.json.tmp` first and renames it over the target,
//! so a crash mid-write never leaves a truncated file behind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use super::error::{ResultsError, ResultsResult};
use super::record::{QuestionRecord, StoredRecord};

/// An entry skipped while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedEntry {
    pub question: String,
    pub reason: String,
}

/// What a load did besides returning records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Entries converted from a legacy shape.
    pub converted_legacy: usize,
    pub malformed: Vec<MalformedEntry>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }
}

/// Results for many questions, ordered by question text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: BTreeMap<String, QuestionRecord>,
    /// Original JSON of legacy and malformed entries, saved back verbatim
    /// until the question is replaced.
    preserved: BTreeMap<String, Value>,
}

/// One entry as written to disk.
#[derive(Serialize)]
#[serde(untagged)]
enum Persisted<'a> {
    Record(&'a QuestionRecord),
    Raw(&'a Value),
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `question` has an entry, readable or not.
    pub fn contains(&self, question: &str) -> bool {
        self.records.contains_key(question) || self.preserved.contains_key(question)
    }

    /// Questions whose stored entry could not be read.
    pub fn unreadable(&self) -> impl Iterator<Item = &String> {
        self.preserved
            .keys()
            .filter(|question| !self.records.contains_key(*question))
    }

    pub fn get(&self, question: &str) -> Option<&QuestionRecord> {
        self.records.get(question)
    }

    /// Insert or replace the record for `question`.
    pub fn insert(&mut self, question: impl Into<String>, record: QuestionRecord) {
        let question = question.into();
        self.preserved.remove(&question);
        self.records.insert(question, record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QuestionRecord)> {
        self.records.iter()
    }

    pub fn questions(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Parse a results document already in memory.
    pub fn from_json_str(content: &str, origin: &Path) -> ResultsResult<(Self, LoadReport)> {
        let value: Value =
            serde_json::from_str(content).map_err(|source| ResultsError::InvalidJson {
                path: origin.to_path_buf(),
                source,
            })?;
        let Value::Object(entries) = value else {
            return Err(ResultsError::NotAnObject {
                path: origin.to_path_buf(),
            });
        };

        let mut set = Self::new();
        let mut report = LoadReport::default();

        for (question, raw) in entries {
            let stored = match StoredRecord::deserialize(&raw) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(question = %question, error = %e, "skipping unrecognized result entry");
                    report.malformed.push(MalformedEntry {
                        question: question.clone(),
                        reason: "unrecognized record shape".to_string(),
                    });
                    set.preserved.insert(question, raw);
                    continue;
                }
            };

            let legacy = stored.is_legacy();
            match stored.into_record() {
                Ok(record) => {
                    if legacy {
                        report.converted_legacy += 1;
                        set.preserved.insert(question.clone(), raw);
                    }
                    report.loaded += 1;
                    set.records.insert(question, record);
                }
                Err(e) => {
                    warn!(question = %question, error = %e, "skipping malformed result entry");
                    report.malformed.push(MalformedEntry {
                        question: question.clone(),
                        reason: e.to_string(),
                    });
                    set.preserved.insert(question, raw);
                }
            }
        }

        Ok((set, report))
    }

    /// Load a results file.
    pub fn load(path: impl AsRef<Path>) -> ResultsResult<(Self, LoadReport)> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ResultsError::io(path, e))?;
        let (set, report) = Self::from_json_str(&content, path)?;
        debug!(
            path = %path.display(),
            loaded = report.loaded,
            legacy = report.converted_legacy,
            malformed = report.malformed.len(),
            "loaded results"
        );
        Ok((set, report))
    }

    /// Load a results file, or start empty when it does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> ResultsResult<(Self, LoadReport)> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok((Self::new(), LoadReport::default()));
        }
        Self::load(path)
    }

    pub fn to_json(&self) -> ResultsResult<String> {
        let mut entries: BTreeMap<&str, Persisted<'_>> = self
            .records
            .iter()
            .map(|(question, record)| (question.as_str(), Persisted::Record(record)))
            .collect();
        for (question, raw) in &self.preserved {
            entries.insert(question.as_str(), Persisted::Raw(raw));
        }
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Write atomically: temp file, then rename over `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> ResultsResult<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("json.tmp");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResultsError::io(parent, e))?;
        }

        let content = self.to_json()?;
        std::fs::write(&temp_path, &content).map_err(|e| ResultsError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| ResultsError::io(path, e))?;

        Ok(())
    }
}

impl FromIterator<(String, QuestionRecord)> for ResultSet {
    fn from_iter<I: IntoIterator<Item = (String, QuestionRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
            preserved: BTreeMap::new(),
        }
    }
}
