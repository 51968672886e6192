//! One simulated client: register, submit N events, confirm each

use crate::domain::{
    CompletedSession, EventCount, EventRecord, ServerSessionId, SessionError, SessionOrdinal,
};
use crate::engine::cancellation::CancellationSignal;
use crate::engine::pipeline::EventPipeline;
use crate::engine::poller::PollerConfig;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-session settings shared by every session of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub event_count: EventCount,
}

pub struct Session<T> {
    ordinal: SessionOrdinal,
    config: SessionConfig,
    poller_config: PollerConfig,
    transport: Arc<T>,
    cancellation: CancellationSignal,
}

impl<T: Transport + 'static> Session<T> {
    pub fn new(
        ordinal: SessionOrdinal,
        config: SessionConfig,
        poller_config: PollerConfig,
        transport: Arc<T>,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            ordinal,
            config,
            poller_config,
            transport,
            cancellation,
        }
    }

    pub fn ordinal(&self) -> SessionOrdinal {
        self.ordinal
    }

    /// Obtain a session id by submitting the empty placeholder without a tag
    pub async fn register(&self) -> Result<ServerSessionId, SessionError> {
        if self.cancellation.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        match self
            .transport
            .submit(&EventRecord::registration(), None)
            .await
        {
            Ok(Some(session_id)) => Ok(session_id),
            Ok(None) => Err(SessionError::MissingSessionId),
            Err(error) => Err(SessionError::Registration(error.to_string())),
        }
    }

    /// Drive the whole session; returns once every confirmation task is joined
    #[instrument(skip(self), fields(session = %self.ordinal))]
    pub async fn run(self) -> CompletedSession {
        let session_id = match self.register().await {
            Ok(session_id) => session_id,
            Err(error) => {
                warn!(%error, "Session registration failed");
                return CompletedSession::failed(self.ordinal, error);
            }
        };
        debug!(%session_id, events = %self.config.event_count, "Session registered");

        let mut pipeline = EventPipeline::new(
            Arc::clone(&self.transport),
            session_id.clone(),
            self.config.event_count,
            self.poller_config,
            self.cancellation.clone(),
        );
        for index in self.config.event_count.indexes() {
            pipeline.submit(index).await;
        }
        let events = pipeline.finish().await;

        let completed = CompletedSession {
            ordinal: self.ordinal,
            session_id: Some(session_id),
            result: Ok(events),
        };
        info!(
            confirmed = completed.confirmed_count(),
            failed = completed.failed_count(),
            "Session complete"
        );
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventError;
    use crate::engine::cancellation::CancelHandle;
    use crate::transport::memory::{ConfirmBehavior, InMemoryTransport};

    fn session_with(
        transport: &Arc<InMemoryTransport>,
        events: u32,
        cancellation: CancellationSignal,
    ) -> Session<InMemoryTransport> {
        Session::new(
            SessionOrdinal::from(0),
            SessionConfig {
                event_count: EventCount::from(events),
            },
            PollerConfig::default(),
            Arc::clone(transport),
            cancellation,
        )
    }

    #[tokio::test]
    async fn test_registration_failure_produces_no_events() {
        let transport = Arc::new(InMemoryTransport::new().failing_registration());
        let completed = session_with(&transport, 5, CancellationSignal::never())
            .run()
            .await;

        assert!(matches!(completed.error(), Some(SessionError::Registration(_))));
        assert!(completed.events().is_empty());
        assert_eq!(completed.session_id, None);
        assert_eq!(transport.submit_calls(), 1);
        assert_eq!(transport.confirm_calls(), 0);
    }

    #[tokio::test]
    async fn test_completed_session_has_one_outcome_per_event() {
        let transport = Arc::new(InMemoryTransport::new());
        let completed = session_with(&transport, 12, CancellationSignal::never())
            .run()
            .await;

        assert_eq!(completed.events().len(), 12);
        assert_eq!(completed.confirmed_count(), 12);
        assert_eq!(completed.session_id, transport.session_id());
        for (position, outcome) in completed.events().iter().enumerate() {
            assert_eq!(outcome.index().into_inner() as usize, position);
            assert_eq!(
                outcome.confirmation().unwrap().echoed,
                format!("event_{position}")
            );
        }
        assert_eq!(transport.submit_calls(), 13);
    }

    #[tokio::test]
    async fn test_zero_events_still_registers() {
        let transport = Arc::new(InMemoryTransport::new());
        let completed = session_with(&transport, 0, CancellationSignal::never())
            .run()
            .await;

        assert_eq!(completed.result, Ok(vec![]));
        assert!(completed.session_id.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_events_do_not_stop_siblings() {
        let transport = Arc::new(
            InMemoryTransport::new()
                .confirming(ConfirmBehavior::Never)
                .failing_submissions([0]),
        );
        let completed = session_with(&transport, 3, CancellationSignal::never())
            .run()
            .await;

        let events = completed.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].error(), Some(EventError::Submission(_))));
        for outcome in &events[1..] {
            assert_eq!(outcome.error(), Some(&EventError::Exhausted { attempts: 10 }));
            assert_eq!(outcome.attempts(), Some(10));
        }
    }

    #[tokio::test]
    async fn test_registration_without_session_id_is_terminal() {
        use crate::domain::BaseUrl;
        use crate::transport::http::HttpTransport;
        use std::time::Duration;

        let mut server = mockito::Server::new_async().await;
        let registration = server
            .mock("POST", "/send")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let transport = Arc::new(HttpTransport::new(
            BaseUrl::try_new(server.url()).unwrap(),
            Duration::from_secs(5),
        ));
        let completed = Session::new(
            SessionOrdinal::from(1),
            SessionConfig {
                event_count: EventCount::from(3),
            },
            PollerConfig::default(),
            transport,
            CancellationSignal::never(),
        )
        .run()
        .await;

        assert_eq!(completed.error(), Some(&SessionError::MissingSessionId));
        assert!(completed.events().is_empty());
        registration.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_registers() {
        let (handle, signal) = CancelHandle::new();
        handle.cancel();
        let transport = Arc::new(InMemoryTransport::new());
        let completed = session_with(&transport, 4, signal).run().await;

        assert_eq!(completed.error(), Some(&SessionError::Cancelled));
        assert_eq!(transport.submit_calls(), 0);
    }
}
