//! Terminal failures recorded on events and sessions
//!
//! These are values, not control flow: each one is stored on the outcome it
//! belongs to and never aborts sibling events or sessions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single event did not reach confirmed success
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum EventError {
    /// The submit call failed; confirmation was never started
    #[error("Submission failed: {0}")]
    Submission(String),

    /// The confirmation query failed at the transport level; no retry follows
    #[error("Transport failure during confirmation: {0}")]
    Transport(String),

    /// A payload could not be encoded or decoded
    #[error("Encoding failure: {0}")]
    Encoding(String),

    /// Non-success responses used up the whole attempt budget
    #[error("max attempts reached ({attempts})")]
    Exhausted { attempts: u32 },

    #[error("Confirmation deadline of {after_ms}ms exceeded")]
    DeadlineExceeded { after_ms: u64 },

    #[error("Cancelled")]
    Cancelled,

    /// The task owning this event ended without reporting
    #[error("Aborted: {0}")]
    Aborted(String),
}

impl EventError {
    /// Stable short label used when grouping failures in reports
    pub fn label(&self) -> &'static str {
        match self {
            EventError::Submission(_) => "submission",
            EventError::Transport(_) => "transport",
            EventError::Encoding(_) => "encoding",
            EventError::Exhausted { .. } => "exhausted",
            EventError::DeadlineExceeded { .. } => "deadline",
            EventError::Cancelled => "cancelled",
            EventError::Aborted(_) => "aborted",
        }
    }
}

/// Why a session never got to submit its events
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum SessionError {
    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Registration response carried no session id")]
    MissingSessionId,

    #[error("Cancelled before registration")]
    Cancelled,

    #[error("Session task aborted: {0}")]
    Aborted(String),
}
