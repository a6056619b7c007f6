//! Inputs to the connection state machine

/// Something the connection reacted to: a caller command, a transport
/// notification, or the retry timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { url: String, max_retries: u32 },
    Close,
    TransportOpened { generation: u64 },
    /// Error or close reported by the transport. Both are handled the same
    /// way; whichever arrives second for a generation is stale.
    TransportFailed { generation: u64, reason: String },
    RetryElapsed { generation: u64 },
}
