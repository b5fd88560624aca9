//! Persisted debate results and question corpora.

pub mod corpus;
pub mod error;
pub mod record;
pub mod store;

pub use corpus::{load_corpus, write_corpus, Problem};
pub use error::{ResultsError, ResultsResult};
pub use record::{round_ballots, AgentEntry, QuestionRecord, RecordedOutcome, ScoreEntry, ShapeError};
pub use store::{LoadReport, MalformedEntry, ResultSet};
