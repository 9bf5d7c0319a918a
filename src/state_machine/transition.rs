//! Pure state transition function
//!
//! Given the same session, table and event this always produces the same
//! result with no I/O. Phrase choice, reply delays and the outreach partner
//! pick are the runtime's business.

use super::{
    AfterSend, Command, DialogueState, EdgeKind, Effect, Event, InboundMessage, Session,
    TimerKind, TransitionTable,
};
use crate::nick::irc_eq;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn cancel_timer(mut self) -> Self {
        self.session.generation += 1;
        self.with_effect(Effect::CancelTimer)
    }

    fn arm_timer(mut self, kind: TimerKind) -> Self {
        self.session.generation += 1;
        let generation = self.session.generation;
        self.with_effect(Effect::ArmTimer { kind, generation })
    }

    fn say(self, state: DialogueState) -> Self {
        let effect = Effect::say(state, self.session.partner.as_deref());
        self.with_effect(effect)
    }

    /// Back to START with nobody bound and a fresh initial wait
    fn reset(mut self) -> Self {
        self.session.state = DialogueState::Start;
        self.session.partner = None;
        self.arm_timer(TimerKind::InitialWait)
    }
}

/// Reasons an event is dropped without touching the session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Malformed event: missing sender or target")]
    Malformed,
    #[error("Empty reply from {sender}")]
    EmptyReply { sender: String },
    #[error("Ignoring {sender}, conversation is bound to {partner}")]
    NotPartner { sender: String, partner: String },
    #[error("{nick} is not the conversation partner")]
    Bystander { nick: String },
    #[error("Stale timer (fired generation {fired}, current {current})")]
    StaleTimer { fired: u64, current: u64 },
}

/// Initial effects for a freshly started session
pub fn boot(session: &Session) -> TransitionResult {
    TransitionResult::new(session.clone()).reset()
}

/// Pure transition function
pub fn transition(
    session: &Session,
    table: &TransitionTable,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Inbound(message) => on_inbound(session, table, message),
        Event::Renamed { old, new } => on_renamed(session, &old, new),
        Event::Timeout {
            generation,
            stand_in,
        } => on_timeout(session, table, generation, stand_in),
    }
}

/// Follow the partner across a nickname change; the turn and its timer
/// carry on untouched
fn on_renamed(
    session: &Session,
    old: &str,
    new: String,
) -> Result<TransitionResult, TransitionError> {
    match &session.partner {
        Some(partner) if irc_eq(partner, old) => {
            let mut next = session.clone();
            next.partner = Some(new);
            Ok(TransitionResult::new(next))
        }
        _ => Err(TransitionError::Bystander {
            nick: old.to_string(),
        }),
    }
}

fn on_inbound(
    session: &Session,
    table: &TransitionTable,
    message: InboundMessage,
) -> Result<TransitionResult, TransitionError> {
    if message.is_malformed() {
        return Err(TransitionError::Malformed);
    }

    if !session.accepts(&message.sender) {
        return Err(TransitionError::NotPartner {
            sender: message.sender,
            partner: session.partner.clone().unwrap_or_default(),
        });
    }

    if message.text.trim().is_empty() {
        return Err(TransitionError::EmptyReply {
            sender: message.sender,
        });
    }

    let mut next = session.clone();
    if next.partner.is_none() {
        next.partner = Some(message.sender);
    }

    // The pending timer goes first so a timeout for this turn can never land
    let result = TransitionResult::new(next)
        .cancel_timer()
        .with_effect(Effect::Pause);

    let result = match Command::parse(&message.text) {
        Command::Die => {
            let to = result.session.partner.clone();
            result
                .with_effect(Effect::Farewell { to })
                .with_effect(Effect::Shutdown)
        }
        Command::Forget => result.reset(),
        Command::Participants => {
            let kind = if result.session.state == DialogueState::Start {
                TimerKind::InitialWait
            } else {
                TimerKind::Turn
            };
            result
                .with_effect(Effect::ReportParticipants)
                .arm_timer(kind)
        }
        Command::Chat => {
            let landed = table.next(session.state, EdgeKind::Success);
            enter(result, table, landed)
        }
    };

    Ok(result)
}

fn on_timeout(
    session: &Session,
    table: &TransitionTable,
    generation: u64,
    stand_in: Option<String>,
) -> Result<TransitionResult, TransitionError> {
    if generation != session.generation {
        return Err(TransitionError::StaleTimer {
            fired: generation,
            current: session.generation,
        });
    }

    let mut next = session.clone();
    if next.partner.is_none() {
        next.partner = stand_in;
    }

    let landed = table.next(session.state, EdgeKind::Timeout);
    Ok(enter(TransitionResult::new(next), table, landed))
}

/// Speak in `landed`, take at most one follow-through hop, then wait
fn enter(
    mut result: TransitionResult,
    table: &TransitionTable,
    landed: DialogueState,
) -> TransitionResult {
    if landed.is_terminal() {
        return result.reset();
    }

    result.session.state = landed;
    let mut result = result.say(landed);

    if table.after_send(landed) == AfterSend::AwaitReply {
        return result.arm_timer(TimerKind::Turn);
    }

    let hop = table.next(landed, EdgeKind::Success);
    if hop.is_terminal() {
        return result.reset();
    }

    result.session.state = hop;
    result
        .with_effect(Effect::Pause)
        .say(hop)
        .arm_timer(TimerKind::Turn)
}
