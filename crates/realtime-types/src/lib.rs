//! Wire and transcript types shared by the realtime connection and the session layer.
//!
//! Nothing in this crate performs I/O. The connection manager treats every
//! frame as an opaque [`Payload`]; [`parse_frame`] is the single place where
//! inbound shapes are interpreted and normalized into [`AgentEvent`]s.

pub mod event;
pub mod frame;
pub mod payload;
pub mod status;
pub mod transcript;

pub use event::AgentEvent;
pub use frame::{InboundFrame, parse_frame};
pub use payload::{END_OF_SPEECH, Payload, STOP, VoiceMode};
pub use status::ConnectionStatus;
pub use transcript::{Role, TranscriptMessage};
