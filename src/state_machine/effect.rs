//! Effects produced by state transitions

use super::DialogueState;

/// Which configured duration a timer should run for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Standard wait after the bot has spoken
    Turn,
    /// Longer wait at startup and after every reset
    InitialWait,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stop the live timer, if any
    CancelTimer,

    /// Wait a short random moment before answering
    Pause,

    /// Send a phrase picked from the catalog for `state`
    Say {
        state: DialogueState,
        to: Option<String>,
    },

    /// Send the parting line before shutting down
    Farewell { to: Option<String> },

    /// Post the channel roster
    ReportParticipants,

    /// Start the single live timer for this session
    ArmTimer { kind: TimerKind, generation: u64 },

    /// Stop processing events
    Shutdown,
}

impl Effect {
    pub fn say(state: DialogueState, to: Option<&str>) -> Self {
        Effect::Say {
            state,
            to: to.map(str::to_string),
        }
    }
}
