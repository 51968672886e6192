//! Per-session event pipeline
//!
//! Submissions go out one at a time in index order. After each successful
//! submit a confirmation task is spawned and the next submit starts straight
//! away, so polls for earlier events overlap with later submissions. Each
//! task reports the finished [`EventOutcome`] for its own index; the pipeline
//! places it in the arena when the task is joined.

use crate::domain::{
    EventCount, EventError, EventIndex, EventOutcome, EventRecord, OutcomeArena, ServerSessionId,
    SubmissionTiming,
};
use crate::engine::cancellation::CancellationSignal;
use crate::engine::poller::{ConfirmationPoller, PollerConfig};
use crate::transport::{Transport, TransportError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, warn};

pub struct EventPipeline<T> {
    transport: Arc<T>,
    session: ServerSessionId,
    poller: Arc<ConfirmationPoller<T>>,
    cancellation: CancellationSignal,
    confirmations: JoinSet<EventOutcome>,
    in_flight: HashMap<Id, (EventIndex, SubmissionTiming)>,
    arena: OutcomeArena,
}

impl<T: Transport + 'static> EventPipeline<T> {
    pub fn new(
        transport: Arc<T>,
        session: ServerSessionId,
        event_count: EventCount,
        poller_config: PollerConfig,
        cancellation: CancellationSignal,
    ) -> Self {
        let poller = Arc::new(ConfirmationPoller::new(
            Arc::clone(&transport),
            session.clone(),
            poller_config,
            cancellation.clone(),
        ));
        Self {
            transport,
            session,
            poller,
            cancellation,
            confirmations: JoinSet::new(),
            in_flight: HashMap::new(),
            arena: OutcomeArena::new(event_count),
        }
    }

    /// Confirmation tasks spawned and not yet joined
    pub fn pending_confirmations(&self) -> usize {
        self.confirmations.len()
    }

    /// Submit event `index`; on success hand it to a concurrent confirmation task
    pub async fn submit(&mut self, index: EventIndex) {
        if self.cancellation.is_cancelled() {
            self.store(EventOutcome::not_submitted(index, EventError::Cancelled));
            return;
        }

        let record = EventRecord::numbered(index);
        let started_at = Utc::now();
        let submitted = self.transport.submit(&record, Some(&self.session)).await;
        let timing = SubmissionTiming {
            started_at,
            finished_at: Utc::now(),
        };

        if let Err(failure) = submitted {
            debug!(session = %self.session, %index, %failure, "Submission failed");
            let error = match failure {
                TransportError::Encoding(cause) => EventError::Encoding(cause),
                other => EventError::Submission(other.to_string()),
            };
            self.store(EventOutcome::submit_failed(index, timing, error));
            return;
        }

        let poller = Arc::clone(&self.poller);
        let handle = self.confirmations.spawn(async move {
            let report = poller.confirm(index).await;
            EventOutcome::polled(index, timing, report)
        });
        self.in_flight.insert(handle.id(), (index, timing));
    }

    /// Join every confirmation task and return outcomes in index order
    pub async fn finish(mut self) -> Vec<EventOutcome> {
        while let Some(joined) = self.confirmations.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    self.in_flight.remove(&id);
                    self.store(outcome);
                }
                Err(join_error) => {
                    let Some((index, timing)) = self.in_flight.remove(&join_error.id()) else {
                        error!(session = %self.session, %join_error, "Unknown confirmation task failed");
                        continue;
                    };
                    warn!(session = %self.session, %index, %join_error, "Confirmation task aborted");
                    self.store(EventOutcome::aborted(
                        index,
                        Some(timing),
                        join_error.to_string(),
                    ));
                }
            }
        }
        debug!(session = %self.session, recorded = self.arena.filled(), "Confirmations joined");
        self.arena.into_outcomes()
    }

    fn store(&mut self, outcome: EventOutcome) {
        if let Err(slot_error) = self.arena.record(outcome) {
            error!(session = %self.session, %slot_error, "Dropping outcome");
        }
    }
}
