//! Connection-level IRC state
//!
//! Pure bookkeeping: registration, nick collisions, PING replies, channel
//! rosters, and turning PRIVMSG lines into inbound chat.

use super::message::{strip_membership_prefix, IrcMessage};
use crate::nick::{irc_eq, irc_lower};
use crate::state_machine::{ChatEvent, InboundMessage};
use std::collections::{BTreeSet, HashMap};

/// What the connection should do in response to a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a raw protocol line
    Send(String),
    /// Hand something to the dialogue
    Deliver(ChatEvent),
}

/// Per-connection state
#[derive(Debug)]
pub struct ProtocolState {
    /// Nickname asked for at registration
    desired: String,
    nickname: String,
    channel: String,
    /// Keyed by case-folded channel name
    rosters: HashMap<String, BTreeSet<String>>,
}

impl ProtocolState {
    pub fn new(nickname: impl Into<String>, channel: impl Into<String>) -> Self {
        let nickname = nickname.into();
        Self {
            desired: nickname.clone(),
            nickname,
            channel: channel.into(),
            rosters: HashMap::new(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Forget everything learned on a previous socket
    pub fn reset_session(&mut self) {
        self.nickname.clone_from(&self.desired);
        self.rosters.clear();
    }

    /// Lines that open a session with the server
    pub fn registration(&self) -> Vec<String> {
        let nick = &self.nickname;
        vec![format!("NICK {nick}"), format!("USER {nick} 0 * :{nick}")]
    }

    pub fn roster(&self, channel: &str) -> Vec<String> {
        self.rosters
            .get(&irc_lower(channel))
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn handle(&mut self, msg: &IrcMessage) -> Vec<Action> {
        match msg.command.as_str() {
            "PING" => {
                let token = msg.param(0).unwrap_or_default();
                vec![Action::Send(format!("PONG :{token}"))]
            }

            // RPL_WELCOME: registration accepted under the nick in param 0
            "001" => {
                if let Some(nick) = msg.param(0) {
                    self.nickname = nick.to_string();
                }
                tracing::info!(nickname = %self.nickname, channel = %self.channel, "Registered, joining channel");
                vec![Action::Send(format!("JOIN {}", self.channel))]
            }

            // ERR_NICKNAMEINUSE
            "433" => {
                self.nickname.push('_');
                tracing::warn!(nickname = %self.nickname, "Nickname in use, retrying");
                vec![Action::Send(format!("NICK {}", self.nickname))]
            }

            // RPL_NAMREPLY: <me> <type> <channel> :<names>
            "353" => {
                if let (Some(channel), Some(names)) = (msg.param(2), msg.param(3)) {
                    let roster = self.rosters.entry(irc_lower(channel)).or_default();
                    for name in names.split_whitespace() {
                        let name = strip_membership_prefix(name);
                        if !name.is_empty() {
                            roster.insert(name.to_string());
                        }
                    }
                }
                vec![]
            }

            "JOIN" => {
                if let (Some(nick), Some(channel)) = (msg.source_nick(), msg.param(0)) {
                    let key = irc_lower(channel);
                    if irc_eq(nick, &self.nickname) {
                        self.rosters.insert(key.clone(), BTreeSet::new());
                    }
                    self.rosters
                        .entry(key)
                        .or_default()
                        .insert(nick.to_string());
                }
                vec![]
            }

            "PART" => {
                if let (Some(nick), Some(channel)) = (msg.source_nick(), msg.param(0)) {
                    self.leave(channel, nick);
                }
                vec![]
            }

            "KICK" => {
                if let (Some(channel), Some(victim)) = (msg.param(0), msg.param(1)) {
                    self.leave(channel, victim);
                }
                vec![]
            }

            "QUIT" => {
                if let Some(nick) = msg.source_nick() {
                    for roster in self.rosters.values_mut() {
                        roster.retain(|name| !irc_eq(name, nick));
                    }
                }
                vec![]
            }

            "NICK" => {
                let (Some(old), Some(new)) = (msg.source_nick(), msg.param(0)) else {
                    return vec![];
                };

                let mut seen = false;
                for roster in self.rosters.values_mut() {
                    let before = roster.len();
                    roster.retain(|name| !irc_eq(name, old));
                    if roster.len() != before {
                        roster.insert(new.to_string());
                        seen = true;
                    }
                }

                if irc_eq(old, &self.nickname) {
                    self.nickname = new.to_string();
                    vec![]
                } else if seen {
                    vec![Action::Deliver(ChatEvent::Renamed {
                        old: old.to_string(),
                        new: new.to_string(),
                    })]
                } else {
                    vec![]
                }
            }

            "PRIVMSG" => self
                .privmsg(msg)
                .map(|message| Action::Deliver(ChatEvent::Message(message)))
                .into_iter()
                .collect(),

            _ => vec![],
        }
    }

    fn leave(&mut self, channel: &str, nick: &str) {
        let key = irc_lower(channel);
        if irc_eq(nick, &self.nickname) {
            self.rosters.remove(&key);
        } else if let Some(roster) = self.rosters.get_mut(&key) {
            roster.retain(|name| !irc_eq(name, nick));
        }
    }

    /// Private messages count as-is; channel messages only when addressed
    /// as `<botnick>: text`
    fn privmsg(&self, msg: &IrcMessage) -> Option<InboundMessage> {
        let sender = msg.source_nick()?;
        let target = msg.param(0)?;
        let text = msg.param(1)?;

        // CTCP (ACTION, VERSION, ...) is not conversation
        if text.starts_with('\u{1}') {
            return None;
        }

        if irc_eq(target, &self.nickname) {
            return Some(InboundMessage::new(sender, target, text.trim()));
        }

        let (addressee, rest) = text.split_once(':')?;
        irc_eq(addressee.trim_end(), &self.nickname)
            .then(|| InboundMessage::new(sender, target, rest.trim()))
    }
}
