//! Realtime voice client.
//!
//! Re-exports the pieces most consumers need: the wire types, the reconnecting
//! connection manager, and the session that turns agent events into a
//! transcript.

pub use nargis_core::{
    Accumulated, RealtimeSession, SessionError, SessionEvent, SessionState, accumulate,
};
pub use nargis_realtime::{
    ConnectionManager, RealtimeError, ReconnectPolicy, Subscription, Transport,
    WebSocketTransport,
};
pub use nargis_realtime_types::{
    AgentEvent, ConnectionStatus, InboundFrame, Payload, Role, TranscriptMessage, VoiceMode,
    parse_frame,
};
