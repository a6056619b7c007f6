use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a realtime connection.
///
/// Exactly one status is current at any time. The manager emits one status
/// event per transition, in the order the transitions happen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Created but `connect()` has not been called yet.
    #[default]
    Idle,
    /// A transport attempt is in flight.
    Connecting,
    /// The transport is established and `send` is forwarded.
    Open,
    /// The transport dropped and a retry timer is armed.
    Retrying,
    /// Closed by the caller. Terminal.
    Closed,
    /// The retry budget is exhausted. Only a fresh `connect()` leaves this state.
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Retrying => "retrying",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        }
    }

    /// Whether the manager is either connected or working towards it.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Open | ConnectionStatus::Retrying
        )
    }

    /// Short label for a connectivity indicator.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "Offline",
            ConnectionStatus::Connecting => "Connecting…",
            ConnectionStatus::Open => "Connected",
            ConnectionStatus::Retrying => "Reconnecting…",
            ConnectionStatus::Closed | ConnectionStatus::Error => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
