//! Transport seam between the engine and the ingestion service
//!
//! The engine only sees the [`Transport`] trait. [`http::HttpTransport`] talks
//! to a real service; [`memory::InMemoryTransport`] simulates one in-process.

pub mod http;
pub mod memory;

use crate::domain::{Confirmation, EventIndex, EventRecord, ServerSessionId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Answer to one confirmation query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmReply {
    Confirmed(Confirmation),
    /// The service answered, but not with success
    NotConfirmed { status: u16 },
}

/// Failures of a single transport call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Calls the engine makes against the ingestion service
///
/// One instance serves a single session, but confirmation polls for that
/// session run concurrently, so implementations must tolerate parallel calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit an event, tagged with `session` when given
    ///
    /// Returns the session id carried by the response body, if any.
    async fn submit(
        &self,
        event: &EventRecord,
        session: Option<&ServerSessionId>,
    ) -> Result<Option<ServerSessionId>, TransportError>;

    /// Ask whether event `index` of `session` has been recorded
    async fn confirm(
        &self,
        session: &ServerSessionId,
        index: EventIndex,
    ) -> Result<ConfirmReply, TransportError>;
}
