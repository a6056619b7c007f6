use nargis_realtime_types::ConnectionStatus;
use std::time::Duration;

/// Work for the runtime to carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a new transport attempt tagged with `generation`
    OpenTransport { url: String, generation: u64 },

    /// Close and drop the current transport, if any
    ReleaseTransport,

    /// Arm the retry timer. `delay` is the un-jittered backoff.
    ScheduleRetry {
        delay: Duration,
        generation: u64,
        attempt: u32,
    },

    CancelRetry,

    /// Publish a status change to observers
    NotifyStatus(ConnectionStatus),
}
