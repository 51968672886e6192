//! Per-event and per-session outcomes
//!
//! An [`EventOutcome`] is built once, by the task that owns the event, from
//! explicit results; it is never patched in place. Outcomes for a session are
//! collected into an [`OutcomeArena`]: one slot per event index, allocated up
//! front and never resized, so each slot has exactly one writer.

use crate::domain::errors::{EventError, SessionError};
use crate::domain::types::{EventCount, EventIndex, ServerSessionId, SessionOrdinal};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

/// Wall-clock bounds of a submit call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SubmissionTiming {
    pub fn latency(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Wall-clock bounds and attempt count of a confirmation poll
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PollTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
}

impl PollTiming {
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// What the service reported for a recorded event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    /// Persistence time as recorded by the service
    pub recorded_at: DateTime<Utc>,
    /// Short string field echoed back by the service
    pub echoed: String,
}

/// Result of one confirmation poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollReport {
    pub timing: PollTiming,
    pub result: Result<Confirmation, EventError>,
}

/// Everything recorded about one event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    index: EventIndex,
    submission: Option<SubmissionTiming>,
    poll: Option<PollTiming>,
    result: Result<Confirmation, EventError>,
}

impl EventOutcome {
    /// Event never submitted (cancelled first)
    pub fn not_submitted(index: EventIndex, error: EventError) -> Self {
        Self {
            index,
            submission: None,
            poll: None,
            result: Err(error),
        }
    }

    /// Submit call failed, so no poll was started
    pub fn submit_failed(index: EventIndex, submission: SubmissionTiming, error: EventError) -> Self {
        Self {
            index,
            submission: Some(submission),
            poll: None,
            result: Err(error),
        }
    }

    pub fn polled(index: EventIndex, submission: SubmissionTiming, report: PollReport) -> Self {
        Self {
            index,
            submission: Some(submission),
            poll: Some(report.timing),
            result: report.result,
        }
    }

    /// The confirmation task for this event vanished without a report
    pub fn aborted(
        index: EventIndex,
        submission: Option<SubmissionTiming>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            index,
            submission,
            poll: None,
            result: Err(EventError::Aborted(cause.into())),
        }
    }

    pub fn index(&self) -> EventIndex {
        self.index
    }

    pub fn submission(&self) -> Option<&SubmissionTiming> {
        self.submission.as_ref()
    }

    pub fn poll(&self) -> Option<&PollTiming> {
        self.poll.as_ref()
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&EventError> {
        self.result.as_ref().err()
    }

    /// Attempts consumed by the poll, if one ran
    pub fn attempts(&self) -> Option<u32> {
        self.poll.map(|poll| poll.attempts)
    }

    pub fn is_confirmed(&self) -> bool {
        self.result.is_ok()
    }

    /// Time between the end of the submit call and the service's persistence timestamp
    pub fn recorded_lag(&self) -> Option<Duration> {
        let submission = self.submission?;
        let confirmation = self.confirmation()?;
        Some(confirmation.recorded_at - submission.finished_at)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SlotError {
    #[error("Event {index} is outside an arena of {capacity} slots")]
    OutOfRange { index: EventIndex, capacity: usize },

    #[error("Event {index} already has an outcome")]
    Occupied { index: EventIndex },
}

/// Fixed-capacity outcome storage indexed by event number
#[derive(Debug)]
pub struct OutcomeArena {
    slots: Box<[Option<EventOutcome>]>,
}

impl OutcomeArena {
    pub fn new(count: EventCount) -> Self {
        let slots = count.indexes().map(|_| None).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Store an outcome in the slot named by its index
    pub fn record(&mut self, outcome: EventOutcome) -> Result<(), SlotError> {
        let index = outcome.index();
        let capacity = self.slots.len();
        let slot = usize::try_from(index.into_inner())
            .ok()
            .and_then(|position| self.slots.get_mut(position))
            .ok_or(SlotError::OutOfRange { index, capacity })?;
        if slot.is_some() {
            return Err(SlotError::Occupied { index });
        }
        *slot = Some(outcome);
        Ok(())
    }

    /// Consume the arena; slots nobody filled become aborted outcomes
    pub fn into_outcomes(self) -> Vec<EventOutcome> {
        self.slots
            .into_vec()
            .into_iter()
            .zip(0u32..)
            .map(|(slot, position)| {
                slot.unwrap_or_else(|| {
                    EventOutcome::aborted(EventIndex::from(position), None, "outcome never recorded")
                })
            })
            .collect()
    }
}

/// A session after its join: events in index order, or the reason it never ran
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletedSession {
    pub ordinal: SessionOrdinal,
    pub session_id: Option<ServerSessionId>,
    pub result: Result<Vec<EventOutcome>, SessionError>,
}

impl CompletedSession {
    pub fn failed(ordinal: SessionOrdinal, error: SessionError) -> Self {
        Self {
            ordinal,
            session_id: None,
            result: Err(error),
        }
    }

    /// Event outcomes; empty when the session never registered
    pub fn events(&self) -> &[EventOutcome] {
        match &self.result {
            Ok(events) => events,
            Err(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.result.as_ref().err()
    }

    pub fn confirmed_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_confirmed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.events().len() - self.confirmed_count()
    }
}
