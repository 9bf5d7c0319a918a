//! Dialogue state types

use crate::nick::irc_eq;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Dialogue State
// ============================================================================

/// Where the small-talk script currently stands
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum DialogueState {
    /// Nobody engaged yet, waiting out the initial delay
    #[default]
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "initial_outreach_1")]
    InitialOutreach1,
    #[serde(rename = "secondary_outreach_1")]
    SecondaryOutreach1,
    #[serde(rename = "giveup_frustrated_1")]
    GiveupFrustrated1,
    #[serde(rename = "inquiry_1")]
    Inquiry1,
    #[serde(rename = "inquiry_reply_1")]
    InquiryReply1,
    #[serde(rename = "outreach_reply_2")]
    OutreachReply2,
    #[serde(rename = "inquiry_2")]
    Inquiry2,
    #[serde(rename = "giveup_frustrated_2")]
    GiveupFrustrated2,
    #[serde(rename = "inquiry_reply_2")]
    InquiryReply2,
    /// Conversation over; the session resets as soon as it lands here
    #[serde(rename = "end")]
    End,
}

impl DialogueState {
    pub const COUNT: usize = 11;

    pub const ALL: [DialogueState; Self::COUNT] = [
        DialogueState::Start,
        DialogueState::InitialOutreach1,
        DialogueState::SecondaryOutreach1,
        DialogueState::GiveupFrustrated1,
        DialogueState::Inquiry1,
        DialogueState::InquiryReply1,
        DialogueState::OutreachReply2,
        DialogueState::Inquiry2,
        DialogueState::GiveupFrustrated2,
        DialogueState::InquiryReply2,
        DialogueState::End,
    ];

    /// Dense index into per-state tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Only END is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, DialogueState::End)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DialogueState::Start => "start",
            DialogueState::InitialOutreach1 => "initial_outreach_1",
            DialogueState::SecondaryOutreach1 => "secondary_outreach_1",
            DialogueState::GiveupFrustrated1 => "giveup_frustrated_1",
            DialogueState::Inquiry1 => "inquiry_1",
            DialogueState::InquiryReply1 => "inquiry_reply_1",
            DialogueState::OutreachReply2 => "outreach_reply_2",
            DialogueState::Inquiry2 => "inquiry_2",
            DialogueState::GiveupFrustrated2 => "giveup_frustrated_2",
            DialogueState::InquiryReply2 => "inquiry_reply_2",
            DialogueState::End => "end",
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stimulus that drives a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// An accepted reply from the partner
    Success,
    /// No reply within the armed duration
    Timeout,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Success => f.write_str("success"),
            EdgeKind::Timeout => f.write_str("timeout"),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// The one conversation the bot is having
///
/// `generation` identifies the current turn's timer. Every cancel and every
/// arm bumps it, so a tick carrying an older generation is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: DialogueState,
    pub partner: Option<String>,
    pub channel: String,
    pub generation: u64,
}

impl Session {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            state: DialogueState::Start,
            partner: None,
            channel: channel.into(),
            generation: 0,
        }
    }

    /// Check whether `sender` may drive the dialogue
    pub fn accepts(&self, sender: &str) -> bool {
        self.partner
            .as_deref()
            .is_none_or(|partner| irc_eq(partner, sender))
    }
}
