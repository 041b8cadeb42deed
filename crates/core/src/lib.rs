//! Domain types and in-memory view state for the recruiting dashboard.
//!
//! Everything here is synchronous and free of I/O; the app crate wraps these
//! structures in a session context and drives them from network results.

pub mod insights;
pub mod selection;
pub mod store;
pub mod types;

pub use insights::InsightsAggregate;
pub use selection::SelectionSet;
pub use store::{CandidateStore, PatchOutcome};
pub use types::{
    AlertSeverity, BiasAlert, CandidateStatus, DiversityMetrics, InsightsSnapshot, MatchKey,
    MatchRecord, ShortlistBasis, SkillCount, StatusPatch, UnknownStatus,
};
