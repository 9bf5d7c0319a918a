//! Transition table
//!
//! The table is total over (state, edge) and checked once at construction, so
//! `next` is a plain lookup with no failure path.

use super::{DialogueState, EdgeKind};
use crate::config::ConfigError;

/// What the bot does right after speaking in a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfterSend {
    /// Arm the turn timer and wait for the partner
    #[default]
    AwaitReply,
    /// Take one more `success` edge immediately
    FollowThrough,
}

/// One row of table configuration
#[derive(Debug, Clone, Copy)]
pub struct Row {
    pub state: DialogueState,
    pub success: DialogueState,
    pub timeout: DialogueState,
    pub after_send: AfterSend,
}

impl Row {
    const fn awaiting(state: DialogueState, success: DialogueState, timeout: DialogueState) -> Self {
        Self {
            state,
            success,
            timeout,
            after_send: AfterSend::AwaitReply,
        }
    }

    const fn following(
        state: DialogueState,
        success: DialogueState,
        timeout: DialogueState,
    ) -> Self {
        Self {
            state,
            success,
            timeout,
            after_send: AfterSend::FollowThrough,
        }
    }
}

/// The small-talk script
const STANDARD_ROWS: [Row; DialogueState::COUNT] = {
    use DialogueState as S;
    [
        Row::awaiting(S::Start, S::InitialOutreach1, S::InitialOutreach1),
        Row::awaiting(S::InitialOutreach1, S::OutreachReply2, S::SecondaryOutreach1),
        Row::awaiting(S::SecondaryOutreach1, S::OutreachReply2, S::GiveupFrustrated1),
        Row::awaiting(S::OutreachReply2, S::Inquiry1, S::GiveupFrustrated2),
        Row::awaiting(S::Inquiry1, S::InquiryReply2, S::GiveupFrustrated1),
        // "I'm fine" is immediately followed by "and you?"
        Row::following(S::InquiryReply2, S::Inquiry2, S::GiveupFrustrated1),
        Row::awaiting(S::Inquiry2, S::InquiryReply1, S::GiveupFrustrated2),
        Row::following(S::InquiryReply1, S::End, S::GiveupFrustrated2),
        Row::following(S::GiveupFrustrated1, S::End, S::End),
        Row::following(S::GiveupFrustrated2, S::End, S::End),
        Row::awaiting(S::End, S::End, S::End),
    ]
};

/// Immutable (state, edge) -> state mapping
#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: [(DialogueState, DialogueState); DialogueState::COUNT],
    after_send: [AfterSend; DialogueState::COUNT],
}

impl TransitionTable {
    /// The built-in script
    pub fn standard() -> Result<Self, ConfigError> {
        Self::from_rows(&STANDARD_ROWS)
    }

    /// Build and validate a table
    ///
    /// Every state needs a row, END must be absorbing, and a follow-through
    /// state may not lead into another follow-through state.
    pub fn from_rows(rows: &[Row]) -> Result<Self, ConfigError> {
        let mut edges: [Option<(DialogueState, DialogueState)>; DialogueState::COUNT] =
            [None; DialogueState::COUNT];
        let mut after_send = [AfterSend::AwaitReply; DialogueState::COUNT];

        for row in rows {
            edges[row.state.index()] = Some((row.success, row.timeout));
            after_send[row.state.index()] = row.after_send;
        }

        let mut resolved = [(DialogueState::End, DialogueState::End); DialogueState::COUNT];
        for state in DialogueState::ALL {
            resolved[state.index()] = edges[state.index()].ok_or(ConfigError::MissingEdge {
                state,
                edge: EdgeKind::Success,
            })?;
        }

        let table = Self {
            edges: resolved,
            after_send,
        };

        for edge in [EdgeKind::Success, EdgeKind::Timeout] {
            if table.next(DialogueState::End, edge) != DialogueState::End {
                return Err(ConfigError::TerminalEscapes { edge });
            }
        }

        for state in DialogueState::ALL {
            if table.after_send(state) == AfterSend::FollowThrough {
                let hop = table.next(state, EdgeKind::Success);
                if !hop.is_terminal() && table.after_send(hop) == AfterSend::FollowThrough {
                    return Err(ConfigError::ChainedFollowThrough { state, next: hop });
                }
            }
        }

        Ok(table)
    }

    /// Pure lookup
    pub fn next(&self, state: DialogueState, edge: EdgeKind) -> DialogueState {
        let (success, timeout) = self.edges[state.index()];
        match edge {
            EdgeKind::Success => success,
            EdgeKind::Timeout => timeout,
        }
    }

    pub fn after_send(&self, state: DialogueState) -> AfterSend {
        self.after_send[state.index()]
    }

    /// States reachable from START over either edge, START included
    pub fn reachable(&self) -> Vec<DialogueState> {
        let mut seen = [false; DialogueState::COUNT];
        let mut stack = vec![DialogueState::Start];
        let mut order = Vec::new();

        while let Some(state) = stack.pop() {
            if seen[state.index()] {
                continue;
            }
            seen[state.index()] = true;
            order.push(state);
            stack.push(self.next(state, EdgeKind::Success));
            stack.push(self.next(state, EdgeKind::Timeout));
        }

        order
    }
}
