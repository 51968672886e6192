//! Domain types for the ingestion harness
//!
//! Wire records, validated identifiers and the outcome model that the engine
//! fills in and the reporter reads.

pub mod errors;
pub mod event;
pub mod outcome;
pub mod types;

pub use errors::{EventError, SessionError};
pub use event::EventRecord;
pub use outcome::{
    CompletedSession, Confirmation, EventOutcome, OutcomeArena, PollReport, PollTiming,
    SubmissionTiming,
};
pub use types::*;
