//! Events that can occur in a dialogue

/// A line of chat that reached the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Nickname of whoever sent it
    pub sender: String,
    /// Channel it was posted in, or the bot's own nick for private messages
    pub target: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        sender: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            target: target.into(),
            text: text.into(),
        }
    }

    /// Events with no sender or no target cannot be attributed
    pub fn is_malformed(&self) -> bool {
        self.sender.trim().is_empty() || self.target.trim().is_empty()
    }
}

/// What the chat network hands to the dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(InboundMessage),
    /// Someone in the channel changed nickname
    Renamed { old: String, new: String },
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Someone talked to the bot
    Inbound(InboundMessage),

    /// A channel member now goes by another nickname
    Renamed { old: String, new: String },

    /// A turn timer ran out
    Timeout {
        generation: u64,
        /// Roster pick to address when nobody is bound yet
        stand_in: Option<String>,
    },
}

impl From<ChatEvent> for Event {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::Message(message) => Event::Inbound(message),
            ChatEvent::Renamed { old, new } => Event::Renamed { old, new },
        }
    }
}

/// Operator commands recognised in inbound text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Say goodbye and shut down
    Die,
    /// Drop the conversation and start over
    Forget,
    /// List who is in the channel
    Participants,
    /// Anything else counts as a reply
    Chat,
}

impl Command {
    /// Exact, case-sensitive match on the trimmed text
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "die" => Command::Die,
            "forget" => Command::Forget,
            "participants" => Command::Participants,
            _ => Command::Chat,
        }
    }
}
