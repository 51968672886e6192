//! Confirmation polling for a single submitted event
//!
//! Bounded retry without backoff. A transport failure ends the poll at once,
//! without retrying; a non-success answer consumes one attempt and the query
//! is repeated until the budget runs out. Every answered query counts as an
//! attempt, so a first-try confirmation reports one attempt.

use crate::domain::{
    EventError, EventIndex, MaxAttempts, PollReport, PollTiming, ServerSessionId,
};
use crate::engine::cancellation::CancellationSignal;
use crate::transport::{ConfirmReply, Transport, TransportError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default deadline for one event's whole poll
pub const DEFAULT_CONFIRMATION_DEADLINE: Duration = Duration::from_secs(120);

/// Tuning for confirmation polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: MaxAttempts,
    /// Pause after a non-success answer; zero re-queries immediately
    pub retry_interval: Duration,
    pub deadline: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::standard(),
            retry_interval: Duration::ZERO,
            deadline: DEFAULT_CONFIRMATION_DEADLINE,
        }
    }
}

/// Polls the service until an event is confirmed or the budget is spent
pub struct ConfirmationPoller<T> {
    transport: Arc<T>,
    session: ServerSessionId,
    config: PollerConfig,
    cancellation: CancellationSignal,
}

impl<T: Transport> ConfirmationPoller<T> {
    pub fn new(
        transport: Arc<T>,
        session: ServerSessionId,
        config: PollerConfig,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            transport,
            session,
            config,
            cancellation,
        }
    }

    /// Poll for event `index`, racing the loop against cancellation and the deadline
    pub async fn confirm(&self, index: EventIndex) -> PollReport {
        let started_at = Utc::now();
        let mut attempts = 0u32;

        let result = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(EventError::Cancelled),
            polled = tokio::time::timeout(self.config.deadline, self.attempt_loop(index, &mut attempts)) => {
                polled.unwrap_or_else(|_| Err(EventError::DeadlineExceeded {
                    after_ms: u64::try_from(self.config.deadline.as_millis()).unwrap_or(u64::MAX),
                }))
            }
        };

        if let Err(error) = &result {
            debug!(session = %self.session, %index, attempts, %error, "Confirmation failed");
        }

        PollReport {
            timing: PollTiming {
                started_at,
                finished_at: Utc::now(),
                attempts,
            },
            result,
        }
    }

    async fn attempt_loop(
        &self,
        index: EventIndex,
        attempts: &mut u32,
    ) -> Result<crate::domain::Confirmation, EventError> {
        loop {
            match self.transport.confirm(&self.session, index).await {
                Err(TransportError::Encoding(cause)) => return Err(EventError::Encoding(cause)),
                Err(error) => return Err(EventError::Transport(error.to_string())),
                Ok(ConfirmReply::Confirmed(confirmation)) => {
                    *attempts += 1;
                    return Ok(confirmation);
                }
                Ok(ConfirmReply::NotConfirmed { .. }) => {
                    *attempts += 1;
                    if *attempts >= self.config.max_attempts.into_inner() {
                        return Err(EventError::Exhausted {
                            attempts: *attempts,
                        });
                    }
                    if !self.config.retry_interval.is_zero() {
                        tokio::time::sleep(self.config.retry_interval).await;
                    }
                }
            }
        }
    }
}
