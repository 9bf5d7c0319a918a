//! Runtime for driving the dialogue
//!
//! One task owns the session. Inbound chat and timer ticks are funnelled into
//! the same loop, so a reply and a timeout arriving together are handled
//! strictly one after the other.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::DialogueRuntime;
pub use traits::*;

use crate::config::ConfigError;
use thiserror::Error;

/// Whether the loop keeps going after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Errors that end the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Chat connection lost for good")]
    ConnectionLost,
}

/// Heading line for the `participants` report
pub const PARTICIPANTS_HEADER: &str = "Participants in channel are:";
