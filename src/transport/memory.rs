//! In-process stand-in for the ingestion service
//!
//! Used for dry runs and throughout the test suite. It assigns session ids,
//! records submitted events and answers confirmation queries, with knobs for
//! injecting the failures the engine has to survive.

use crate::domain::{Confirmation, EventIndex, EventRecord, ServerSessionId};
use crate::transport::{ConfirmReply, Transport, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Status returned while an event is not yet confirmable
pub const NOT_FOUND: u16 = 404;

/// Status returned for submissions the simulated service rejects
pub const BAD_REQUEST: u16 = 400;

/// How confirmation queries are answered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmBehavior {
    /// Confirm on the first query
    Immediate,
    /// Answer not-found this many times per event, then confirm
    AfterNotFound(u32),
    /// Never confirm
    Never,
    /// Fail every query at the transport level
    Unreachable,
    /// Answer not-found this many times per event, then drop the connection
    NotFoundThenUnreachable(u32),
    /// Answer success with a payload that cannot be decoded
    Malformed,
}

#[derive(Debug, Default)]
struct ServiceState {
    session_id: Option<ServerSessionId>,
    recorded: HashMap<u32, Confirmation>,
    not_found_served: HashMap<u32, u32>,
}

/// Simulated ingestion service for one session
#[derive(Debug)]
pub struct InMemoryTransport {
    fail_registration: bool,
    failing_submissions: HashSet<u32>,
    confirm_behavior: ConfirmBehavior,
    latency: Duration,
    state: Mutex<ServiceState>,
    submit_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    confirms_in_flight: AtomicUsize,
    peak_confirms_in_flight: AtomicUsize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// A well-behaved service that confirms immediately
    pub fn new() -> Self {
        Self {
            fail_registration: false,
            failing_submissions: HashSet::new(),
            confirm_behavior: ConfirmBehavior::Immediate,
            latency: Duration::ZERO,
            state: Mutex::new(ServiceState::default()),
            submit_calls: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
            confirms_in_flight: AtomicUsize::new(0),
            peak_confirms_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    pub fn failing_submissions(mut self, indexes: impl IntoIterator<Item = u32>) -> Self {
        self.failing_submissions.extend(indexes);
        self
    }

    pub fn confirming(mut self, behavior: ConfirmBehavior) -> Self {
        self.confirm_behavior = behavior;
        self
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    /// Largest number of confirmation queries observed running at once
    pub fn peak_confirms_in_flight(&self) -> usize {
        self.peak_confirms_in_flight.load(Ordering::SeqCst)
    }

    pub fn session_id(&self) -> Option<ServerSessionId> {
        self.state.lock().session_id.clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn register(&self) -> Result<Option<ServerSessionId>, TransportError> {
        if self.fail_registration {
            return Err(TransportError::Connection(
                "registration refused by simulated service".to_string(),
            ));
        }
        let assigned = ServerSessionId::try_new(Uuid::now_v7().to_string())
            .map_err(|e| TransportError::Encoding(e.to_string()))?;
        self.state.lock().session_id = Some(assigned.clone());
        Ok(Some(assigned))
    }

    fn record(
        &self,
        event: &EventRecord,
        session: &ServerSessionId,
    ) -> Result<Option<ServerSessionId>, TransportError> {
        let index = u32::try_from(event.sint).map_err(|_| TransportError::UnexpectedStatus {
            status: BAD_REQUEST,
            endpoint: "send".to_string(),
        })?;
        if self.failing_submissions.contains(&index) {
            return Err(TransportError::Connection(format!(
                "submission of event {index} dropped by simulated service"
            )));
        }

        let mut state = self.state.lock();
        if state.session_id.as_ref() != Some(session) {
            return Err(TransportError::UnexpectedStatus {
                status: BAD_REQUEST,
                endpoint: "send".to_string(),
            });
        }
        state.recorded.insert(
            index,
            Confirmation {
                recorded_at: Utc::now(),
                echoed: event.sstr.clone(),
            },
        );
        Ok(None)
    }

    fn answer(
        &self,
        session: &ServerSessionId,
        index: EventIndex,
    ) -> Result<ConfirmReply, TransportError> {
        let index = index.into_inner();
        let mut state = self.state.lock();
        if state.session_id.as_ref() != Some(session) {
            return Ok(ConfirmReply::NotConfirmed { status: NOT_FOUND });
        }
        match &self.confirm_behavior {
            ConfirmBehavior::Unreachable => Err(TransportError::Connection(
                "confirmation endpoint unreachable".to_string(),
            )),
            ConfirmBehavior::Never => Ok(ConfirmReply::NotConfirmed { status: NOT_FOUND }),
            ConfirmBehavior::Malformed => Err(TransportError::Encoding(
                "missing field `timestamp`".to_string(),
            )),
            ConfirmBehavior::AfterNotFound(pending) => {
                let served = state.not_found_served.entry(index).or_insert(0);
                if *served < *pending {
                    *served += 1;
                    return Ok(ConfirmReply::NotConfirmed { status: NOT_FOUND });
                }
                Ok(Self::lookup(&state, index))
            }
            ConfirmBehavior::NotFoundThenUnreachable(pending) => {
                let served = state.not_found_served.entry(index).or_insert(0);
                if *served < *pending {
                    *served += 1;
                    return Ok(ConfirmReply::NotConfirmed { status: NOT_FOUND });
                }
                Err(TransportError::Connection(
                    "connection reset by simulated service".to_string(),
                ))
            }
            ConfirmBehavior::Immediate => Ok(Self::lookup(&state, index)),
        }
    }

    fn lookup(state: &ServiceState, index: u32) -> ConfirmReply {
        match state.recorded.get(&index) {
            Some(confirmation) => ConfirmReply::Confirmed(confirmation.clone()),
            None => ConfirmReply::NotConfirmed { status: NOT_FOUND },
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn submit(
        &self,
        event: &EventRecord,
        session: Option<&ServerSessionId>,
    ) -> Result<Option<ServerSessionId>, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        match session {
            None => self.register(),
            Some(session) => self.record(event, session),
        }
    }

    async fn confirm(
        &self,
        session: &ServerSessionId,
        index: EventIndex,
    ) -> Result<ConfirmReply, TransportError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.confirms_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_confirms_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        self.simulate_latency().await;
        let reply = self.answer(session, index);

        self.confirms_in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
