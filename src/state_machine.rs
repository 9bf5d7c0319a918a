//! Core dialogue state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds in events and executes the effects that come back.

mod effect;
pub mod event;
pub mod state;
pub mod table;
pub(crate) mod transition;


pub use effect::{Effect, TimerKind};
pub use event::{ChatEvent, Command, Event, InboundMessage};
pub use state::{DialogueState, EdgeKind, Session};
pub use table::{AfterSend, TransitionTable};
pub use transition::{boot, transition, TransitionError, TransitionResult};
