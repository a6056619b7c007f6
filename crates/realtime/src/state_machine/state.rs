use nargis_realtime_types::ConnectionStatus;

/// Consecutive-failure bookkeeping. Reset whenever a transport opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnState {
    pub status: ConnectionStatus,
    pub retry: RetryState,
    /// Target of the last `connect`; reused by every reconnect.
    pub url: Option<String>,
    /// Identity of the current transport attempt. Events carrying an older
    /// generation come from a transport that has already been released.
    pub generation: u64,
    /// A transport for `generation` has been requested and not yet released.
    pub transport_active: bool,
    pub retry_armed: bool,
}

impl ConnState {
    pub fn is_closed(&self) -> bool {
        self.status == ConnectionStatus::Closed
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.transport_active && self.generation == generation
    }
}
