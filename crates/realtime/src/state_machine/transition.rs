use super::{ConnState, Effect, Event, RetryState};
use crate::policy::ReconnectPolicy;
use nargis_realtime_types::ConnectionStatus;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: ConnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn unchanged(state: &ConnState) -> Self {
        Self::new(state.clone())
    }
}

/// Pure transition function
pub fn transition(state: &ConnState, policy: &ReconnectPolicy, event: Event) -> TransitionResult {
    use ConnectionStatus::*;

    match (state.status, event) {
        // ============================================================
        // Closed absorbs everything
        // ============================================================
        (Closed, _) => TransitionResult::unchanged(state),

        (_, Event::Close) => close(state),

        // ============================================================
        // Connect: only from a resting state
        // ============================================================
        (Idle | Error, Event::Connect { url, max_retries }) => {
            let generation = state.generation + 1;
            TransitionResult::new(ConnState {
                status: Connecting,
                retry: RetryState {
                    attempt: 0,
                    max_retries,
                },
                url: Some(url.clone()),
                generation,
                transport_active: true,
                retry_armed: false,
            })
            .with_effect(Effect::NotifyStatus(Connecting))
            .with_effect(Effect::OpenTransport { url, generation })
        }

        (Connecting | Open | Retrying, Event::Connect { .. }) => TransitionResult::unchanged(state),

        // ============================================================
        // Transport notifications for the current attempt
        // ============================================================
        (Connecting, Event::TransportOpened { generation }) if state.is_current(generation) => {
            TransitionResult::new(ConnState {
                status: Open,
                retry: RetryState {
                    attempt: 0,
                    ..state.retry
                },
                ..state.clone()
            })
            .with_effect(Effect::NotifyStatus(Open))
        }

        (Connecting | Open, Event::TransportFailed { generation, .. })
            if state.is_current(generation) =>
        {
            let attempt = state.retry.attempt.saturating_add(1);
            let retry = RetryState {
                attempt,
                ..state.retry
            };
            match policy.next_delay(attempt, state.retry.max_retries) {
                Some(delay) => TransitionResult::new(ConnState {
                    status: Retrying,
                    retry,
                    transport_active: false,
                    retry_armed: true,
                    ..state.clone()
                })
                .with_effect(Effect::ReleaseTransport)
                .with_effect(Effect::NotifyStatus(Retrying))
                .with_effect(Effect::ScheduleRetry {
                    delay,
                    generation,
                    attempt,
                }),
                None => TransitionResult::new(ConnState {
                    status: Error,
                    retry,
                    transport_active: false,
                    retry_armed: false,
                    ..state.clone()
                })
                .with_effect(Effect::ReleaseTransport)
                .with_effect(Effect::NotifyStatus(Error)),
            }
        }

        // ============================================================
        // Retry timer
        // ============================================================
        (Retrying, Event::RetryElapsed { generation })
            if state.retry_armed && state.generation == generation =>
        {
            let generation = state.generation + 1;
            let Some(url) = state.url.clone() else {
                return TransitionResult::unchanged(state);
            };
            TransitionResult::new(ConnState {
                status: Connecting,
                generation,
                transport_active: true,
                retry_armed: false,
                ..state.clone()
            })
            .with_effect(Effect::NotifyStatus(Connecting))
            .with_effect(Effect::OpenTransport { url, generation })
        }

        // Stale generations, duplicate notifications, timers that lost a race
        _ => TransitionResult::unchanged(state),
    }
}

fn close(state: &ConnState) -> TransitionResult {
    let mut result = TransitionResult::new(ConnState {
        status: ConnectionStatus::Closed,
        transport_active: false,
        retry_armed: false,
        ..state.clone()
    });
    if state.retry_armed {
        result = result.with_effect(Effect::CancelRetry);
    }
    if state.transport_active {
        result = result.with_effect(Effect::ReleaseTransport);
    }
    result.with_effect(Effect::NotifyStatus(ConnectionStatus::Closed))
}
