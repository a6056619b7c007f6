//! Realtime connection management.
//!
//! A [`ConnectionManager`] owns one logical connection across any number of
//! transport attempts. Decisions live in the pure [`state_machine`]; the
//! manager's runtime task only executes the effects it returns (open or
//! release a transport, arm or cancel the retry timer, notify observers).

pub mod error;
pub mod manager;
pub mod observers;
pub mod policy;
pub mod state_machine;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::RealtimeError;
pub use manager::ConnectionManager;
pub use observers::{Observers, Subscription};
pub use policy::ReconnectPolicy;
pub use transport::{Transport, TransportEvent, TransportEvents, TransportLink, WebSocketTransport};

pub use nargis_realtime_types::{ConnectionStatus, Payload};
