//! Voting: resolve per-agent ballots into one decision.
//!
//! Implements plain majority, confidence-weighted, and exponentially weighted
//! votes, an optional confidence gate with a most-confident fallback, and a
//! deterministic tie-break. Tallies are kept in first-seen order so results
//! never depend on hash iteration order.

pub mod aggregator;
pub mod ballot;

pub use aggregator::{Aggregator, AggregatorConfig, TieBreak};
pub use ballot::{Ballot, Decision, TallyEntry, VotingStrategy};
