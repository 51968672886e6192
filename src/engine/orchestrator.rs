//! Runs many sessions concurrently and joins them all
//!
//! Each session gets its own transport from the factory, so no connection
//! state crosses session boundaries. The orchestrator adds no retries or
//! error suppression; whatever a session reports is what comes back.

use crate::domain::{CompletedSession, SessionCount, SessionError, SessionOrdinal};
use crate::engine::cancellation::{CancelHandle, CancellationSignal};
use crate::engine::poller::PollerConfig;
use crate::engine::session::{Session, SessionConfig};
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

pub struct Orchestrator<F> {
    transport_factory: F,
    poller_config: PollerConfig,
    cancel: CancelHandle,
    signal: CancellationSignal,
}

impl<F, T> Orchestrator<F>
where
    F: Fn(SessionOrdinal) -> T,
    T: Transport + 'static,
{
    pub fn new(transport_factory: F, poller_config: PollerConfig) -> Self {
        let (cancel, signal) = CancelHandle::new();
        Self {
            transport_factory,
            poller_config,
            cancel,
            signal,
        }
    }

    /// Handle that cancels every session of this orchestrator
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Launch `session_count` sessions and wait for all of them
    ///
    /// Completed sessions come back ordered by ordinal.
    #[instrument(skip(self, config), fields(events = %config.event_count))]
    pub async fn run_all(
        &self,
        session_count: SessionCount,
        config: SessionConfig,
    ) -> Vec<CompletedSession> {
        let mut sessions = JoinSet::new();
        let mut ordinals = HashMap::new();

        for position in 0..session_count.into_inner() {
            let ordinal = SessionOrdinal::from(position);
            let transport = Arc::new((self.transport_factory)(ordinal));
            let session = Session::new(
                ordinal,
                config,
                self.poller_config,
                transport,
                self.signal.clone(),
            );
            let handle = sessions.spawn(session.run());
            ordinals.insert(handle.id(), ordinal);
        }
        info!(sessions = %session_count, "Sessions launched");

        let mut completed = Vec::with_capacity(session_count.into_inner());
        while let Some(joined) = sessions.join_next_with_id().await {
            match joined {
                Ok((_, session)) => completed.push(session),
                Err(join_error) => match ordinals.get(&join_error.id()) {
                    Some(ordinal) => {
                        error!(session = %ordinal, %join_error, "Session task aborted");
                        completed.push(CompletedSession::failed(
                            *ordinal,
                            SessionError::Aborted(join_error.to_string()),
                        ));
                    }
                    None => error!(%join_error, "Unknown session task failed"),
                },
            }
        }

        completed.sort_by_key(|session| session.ordinal);
        info!(sessions = completed.len(), "All sessions joined");
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCount, EventError};
    use crate::transport::memory::{ConfirmBehavior, InMemoryTransport};
    use std::time::Duration;

    fn config(events: u32) -> SessionConfig {
        SessionConfig {
            event_count: EventCount::from(events),
        }
    }

    #[tokio::test]
    async fn test_runs_every_session() {
        let orchestrator = Orchestrator::new(|_| InMemoryTransport::new(), PollerConfig::default());
        let sessions = orchestrator
            .run_all(SessionCount::from(8), config(5))
            .await;

        assert_eq!(sessions.len(), 8);
        for (position, session) in sessions.iter().enumerate() {
            assert_eq!(session.ordinal, SessionOrdinal::from(position));
            assert_eq!(session.events().len(), 5);
            assert_eq!(session.confirmed_count(), 5);
        }
    }

    #[tokio::test]
    async fn test_failing_session_does_not_affect_others() {
        let orchestrator = Orchestrator::new(
            |ordinal: SessionOrdinal| {
                if ordinal.into_inner() % 2 == 0 {
                    InMemoryTransport::new().failing_registration()
                } else {
                    InMemoryTransport::new()
                }
            },
            PollerConfig::default(),
        );
        let sessions = orchestrator
            .run_all(SessionCount::from(6), config(3))
            .await;

        for session in &sessions {
            if session.ordinal.into_inner() % 2 == 0 {
                assert!(matches!(session.error(), Some(SessionError::Registration(_))));
                assert!(session.events().is_empty());
            } else {
                assert_eq!(session.confirmed_count(), 3);
            }
        }
    }

    #[tokio::test]
    async fn test_session_ids_are_distinct() {
        let orchestrator = Orchestrator::new(|_| InMemoryTransport::new(), PollerConfig::default());
        let sessions = orchestrator
            .run_all(SessionCount::from(10), config(1))
            .await;

        let mut ids: Vec<_> = sessions
            .iter()
            .map(|s| s.session_id.clone().unwrap())
            .collect();
        ids.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn test_zero_sessions_returns_empty() {
        let orchestrator = Orchestrator::new(|_| InMemoryTransport::new(), PollerConfig::default());
        let sessions = orchestrator.run_all(SessionCount::from(0), config(3)).await;
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_ends_the_run() {
        let poller_config = PollerConfig {
            retry_interval: Duration::from_millis(10),
            ..PollerConfig::default()
        };
        let orchestrator = Orchestrator::new(
            |_| {
                InMemoryTransport::new()
                    .confirming(ConfirmBehavior::Never)
                    .with_latency(Duration::from_millis(5))
            },
            poller_config,
        );
        let handle = orchestrator.cancel_handle();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            handle.cancel();
        });

        let sessions = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run_all(SessionCount::from(4), config(50)),
        )
        .await
        .expect("cancelled run terminates");
        canceller.await.unwrap();

        for session in &sessions {
            assert_eq!(session.events().len(), 50);
            assert!(session
                .events()
                .iter()
                .any(|e| e.error() == Some(&EventError::Cancelled)));
        }
    }
}
