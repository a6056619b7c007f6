//! Connection lifecycle state machine.
//!
//! Pure transitions: `transition(state, policy, event)` returns the next state
//! and the effects the runtime has to carry out. Nothing in here touches a
//! socket, a timer or an observer.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConnState, RetryState};
pub use transition::{TransitionResult, transition};
