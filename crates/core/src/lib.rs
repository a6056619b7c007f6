pub mod accumulator;
pub mod session;

pub use accumulator::{Accumulated, accumulate, tool_line};
pub use session::{MAX_TURN_EVENTS, RealtimeSession, SessionError, SessionEvent, SessionState};
