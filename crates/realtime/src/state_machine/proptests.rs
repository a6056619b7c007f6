//! Property-based tests for the connection state machine

use super::*;
use crate::policy::ReconnectPolicy;
use nargis_realtime_types::ConnectionStatus;
use proptest::prelude::*;
use std::time::Duration;

fn policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(50), Duration::from_secs(2))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u32..6).prop_map(|max_retries| Event::Connect {
            url: "ws://test/ws".into(),
            max_retries
        }),
        Just(Event::Close),
        (0u64..6).prop_map(|generation| Event::TransportOpened { generation }),
        (0u64..6).prop_map(|generation| Event::TransportFailed {
            generation,
            reason: "drop".into()
        }),
        (0u64..6).prop_map(|generation| Event::RetryElapsed { generation }),
    ]
}

proptest! {
    #[test]
    fn closed_is_absorbing(prefix in prop::collection::vec(arb_event(), 0..20),
                           suffix in prop::collection::vec(arb_event(), 1..20)) {
        let mut state = ConnState::default();
        for event in prefix {
            state = transition(&state, &policy(), event).new_state;
        }
        state = transition(&state, &policy(), Event::Close).new_state;
        prop_assert!(state.is_closed());

        for event in suffix {
            let result = transition(&state, &policy(), event);
            prop_assert_eq!(&result.new_state, &state);
            prop_assert!(result.effects.is_empty());
        }
    }

    #[test]
    fn status_notifications_track_real_changes(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut state = ConnState::default();
        for event in events {
            let result = transition(&state, &policy(), event);
            let notified: Vec<_> = result.effects.iter().filter_map(|e| match e {
                Effect::NotifyStatus(status) => Some(*status),
                _ => None,
            }).collect();
            if result.new_state.status == state.status {
                prop_assert!(notified.is_empty());
            } else {
                prop_assert_eq!(notified, vec![result.new_state.status]);
            }
            state = result.new_state;
        }
    }

    #[test]
    fn at_most_one_transport_at_a_time(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut state = ConnState::default();
        let mut live = false;
        for event in events {
            let result = transition(&state, &policy(), event);
            for effect in &result.effects {
                match effect {
                    Effect::OpenTransport { .. } => {
                        prop_assert!(!live, "opened a transport while another was live");
                        live = true;
                    }
                    Effect::ReleaseTransport => live = false,
                    _ => {}
                }
            }
            state = result.new_state;
            prop_assert_eq!(live, state.transport_active);
        }
    }

    #[test]
    fn attempts_never_exceed_budget(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut state = ConnState::default();
        for event in events {
            let result = transition(&state, &policy(), event);
            state = result.new_state;
            prop_assert!(state.retry.attempt <= state.retry.max_retries.max(1));
            if state.status == ConnectionStatus::Retrying {
                prop_assert!(state.retry.attempt < state.retry.max_retries);
                prop_assert!(state.retry_armed);
            }
            if state.status == ConnectionStatus::Open {
                prop_assert_eq!(state.retry.attempt, 0);
            }
        }
    }

    #[test]
    fn retries_only_scheduled_when_retrying(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut state = ConnState::default();
        for event in events {
            let result = transition(&state, &policy(), event);
            let schedules = result.effects.iter().any(|e| matches!(e, Effect::ScheduleRetry { .. }));
            if schedules {
                prop_assert_eq!(result.new_state.status, ConnectionStatus::Retrying);
            }
            state = result.new_state;
        }
    }
}
