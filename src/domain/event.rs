//! Wire records exchanged with the ingestion service

use crate::domain::types::EventIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type submitted for every numbered event
pub const EVENT_TYPE: &str = "event";

/// Prefix of the short string field; the event index is appended
pub const SHORT_FIELD_PREFIX: &str = "event_";

/// One event as submitted to `/send`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub sint: i32,
    pub lint: i64,
    pub sstr: String,
    pub lstr: String,
}

impl EventRecord {
    /// Empty placeholder sent without a session tag to obtain a session id
    pub fn registration() -> Self {
        Self {
            kind: String::new(),
            sint: 0,
            lint: 0,
            sstr: String::new(),
            lstr: String::new(),
        }
    }

    /// Payload for event `index` of a session
    pub fn numbered(index: EventIndex) -> Self {
        let index = index.into_inner();
        Self {
            kind: EVENT_TYPE.to_string(),
            sint: i32::try_from(index).unwrap_or(i32::MAX),
            lint: 0,
            sstr: format!("{SHORT_FIELD_PREFIX}{index}"),
            lstr: String::new(),
        }
    }
}

/// Response body of the registration call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionIdBody {
    pub session_id: String,
}

/// Response body of a successful confirmation query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfirmationBody {
    pub timestamp: DateTime<Utc>,
    pub sstr: String,
}
