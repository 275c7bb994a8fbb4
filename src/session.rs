//! Conversation session controller
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! browser reports what the speech vendor did, the controller decides what
//! happens next, and the runtime carries out the resulting effects.

pub mod detect;
mod effect;
pub mod event;
pub mod state;
pub mod transcript;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, Role, SearchOutcome};
pub use state::{ConnectionPhase, SearchPhase, SessionContext, SessionState};
pub use transition::{transition, TransitionError, TransitionResult};
