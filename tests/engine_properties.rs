//! Property-based tests for engine invariants
//!
//! Sessions are run against the in-process simulated service with generated
//! fault mixes; the invariants must hold for every combination.

use ingest_harness::domain::{
    CompletedSession, EventCount, EventError, MaxAttempts, SessionCount, SessionOrdinal,
};
use ingest_harness::engine::{Orchestrator, PollerConfig, SessionConfig};
use ingest_harness::transport::memory::{ConfirmBehavior, InMemoryTransport};
use proptest::collection::hash_set;
use proptest::prelude::*;
use std::collections::HashSet;

pub mod generators {
    use super::*;

    pub fn confirm_behavior() -> impl Strategy<Value = ConfirmBehavior> {
        prop_oneof![
            Just(ConfirmBehavior::Immediate),
            (0u32..12).prop_map(ConfirmBehavior::AfterNotFound),
            Just(ConfirmBehavior::Never),
            Just(ConfirmBehavior::Unreachable),
            (0u32..12).prop_map(ConfirmBehavior::NotFoundThenUnreachable),
            Just(ConfirmBehavior::Malformed),
        ]
    }

    pub fn failing_submissions() -> impl Strategy<Value = HashSet<u32>> {
        hash_set(0u32..24, 0..6)
    }
}

fn run(
    sessions: usize,
    events: u32,
    behavior: ConfirmBehavior,
    failing: HashSet<u32>,
    failing_registration: bool,
) -> Vec<CompletedSession> {
    let orchestrator = Orchestrator::new(
        move |ordinal: SessionOrdinal| {
            let transport = InMemoryTransport::new()
                .confirming(behavior.clone())
                .failing_submissions(failing.iter().copied());
            if failing_registration && ordinal.into_inner() == 0 {
                transport.failing_registration()
            } else {
                transport
            }
        },
        PollerConfig::default(),
    );
    tokio_test::block_on(orchestrator.run_all(
        SessionCount::from(sessions),
        SessionConfig {
            event_count: EventCount::from(events),
        },
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn completed_sessions_have_exactly_n_outcomes(
        sessions in 1usize..6,
        events in 0u32..24,
        behavior in generators::confirm_behavior(),
        failing in generators::failing_submissions(),
        failing_registration in any::<bool>(),
    ) {
        let completed = run(sessions, events, behavior, failing, failing_registration);

        prop_assert_eq!(completed.len(), sessions);
        for session in &completed {
            match &session.result {
                Ok(outcomes) => {
                    prop_assert_eq!(outcomes.len(), events as usize);
                    for (position, outcome) in outcomes.iter().enumerate() {
                        prop_assert_eq!(outcome.index().into_inner() as usize, position);
                    }
                }
                Err(_) => prop_assert!(session.events().is_empty()),
            }
        }
    }

    #[test]
    fn attempt_counts_stay_within_budget(
        events in 1u32..16,
        behavior in generators::confirm_behavior(),
        failing in generators::failing_submissions(),
    ) {
        let budget = MaxAttempts::standard().into_inner();
        let completed = run(2, events, behavior.clone(), failing.clone(), false);

        for session in &completed {
            for outcome in session.events() {
                let index = outcome.index().into_inner();
                if failing.contains(&index) {
                    prop_assert!(matches!(outcome.error(), Some(EventError::Submission(_))));
                    prop_assert!(outcome.poll().is_none());
                    continue;
                }

                let submission = outcome.submission().expect("submitted events carry timing");
                prop_assert!(submission.started_at <= submission.finished_at);

                let attempts = outcome.attempts().expect("submitted events are polled");
                prop_assert!(attempts <= budget);
                match outcome.error() {
                    Some(EventError::Exhausted { attempts: reported }) => {
                        prop_assert_eq!(*reported, budget);
                        prop_assert_eq!(attempts, budget);
                    }
                    Some(EventError::Transport(_)) => {
                        // no retry after a transport failure; earlier answers still count
                        let expected = match &behavior {
                            ConfirmBehavior::NotFoundThenUnreachable(pending) => *pending,
                            _ => 0,
                        };
                        prop_assert_eq!(attempts, expected);
                        prop_assert!(attempts < budget);
                    }
                    Some(EventError::Encoding(_)) => prop_assert_eq!(attempts, 0),
                    Some(other) => prop_assert!(false, "unexpected error {other:?}"),
                    None => {
                        prop_assert!(attempts >= 1);
                        // a full budget without error only when the last answer confirmed
                        if attempts == budget {
                            prop_assert_eq!(&behavior, &ConfirmBehavior::AfterNotFound(budget - 1));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn sessions_never_see_each_others_events(
        sessions in 2usize..8,
        events in 1u32..12,
    ) {
        let completed = run(sessions, events, ConfirmBehavior::Immediate, HashSet::new(), false);

        let ids: HashSet<_> = completed
            .iter()
            .filter_map(|s| s.session_id.clone())
            .collect();
        prop_assert_eq!(ids.len(), sessions);
        for session in &completed {
            for outcome in session.events() {
                let confirmation = outcome.confirmation().expect("immediate service confirms");
                prop_assert_eq!(
                    &confirmation.echoed,
                    &format!("event_{}", outcome.index())
                );
            }
        }
    }
}
