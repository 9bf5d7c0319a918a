//! Dialogue runtime executor
//!
//! Plays the reply dispatcher: binds the partner, feeds events through the
//! pure transition function, then carries out the resulting effects.

use super::traits::ChatTransport;
use super::{Flow, RuntimeError, PARTICIPANTS_HEADER};
use crate::config::Timings;
use crate::nick::irc_eq;
use crate::phrases::{PhraseCatalog, FAREWELL};
use crate::state_machine::{
    boot, transition, ChatEvent, Effect, Event, Session, TimerKind, TransitionResult,
    TransitionTable,
};
use crate::timer::{TimerTick, TurnTimer};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// What woke the loop up
enum Wake {
    Chat(Option<ChatEvent>),
    Tick(TimerTick),
}

/// Single-writer owner of the session
pub struct DialogueRuntime<T>
where
    T: ChatTransport + 'static,
{
    session: Session,
    table: Arc<TransitionTable>,
    phrases: Arc<PhraseCatalog>,
    timings: Timings,
    transport: Arc<T>,
    /// Source for phrase picks, reply delays and outreach partners
    rng: Box<dyn RngCore + Send + Sync>,
    inbound_rx: mpsc::Receiver<ChatEvent>,
    tick_rx: mpsc::Receiver<TimerTick>,
    timer: TurnTimer,
    /// Latest committed session, for observers
    session_tx: watch::Sender<Session>,
}

impl<T> DialogueRuntime<T>
where
    T: ChatTransport + 'static,
{
    pub fn new(
        channel: impl Into<String>,
        table: Arc<TransitionTable>,
        phrases: Arc<PhraseCatalog>,
        timings: Timings,
        transport: Arc<T>,
        rng: Box<dyn RngCore + Send + Sync>,
        inbound_rx: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(8);
        let session = Session::new(channel);
        let (session_tx, _) = watch::channel(session.clone());

        Self {
            session,
            table,
            phrases,
            timings,
            transport,
            rng,
            inbound_rx,
            tick_rx,
            timer: TurnTimer::new(tick_tx),
            session_tx,
        }
    }

    /// Watch committed session snapshots
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    pub async fn run(mut self) -> Result<(), RuntimeError> {
        tracing::info!(channel = %self.session.channel, "Starting dialogue runtime");

        let booted = boot(&self.session);
        if self.apply(booted).await? == Flow::Stop {
            return Ok(());
        }

        // Replies and timer ticks are handled one at a time, in arrival order
        loop {
            let wake = tokio::select! {
                chat = self.inbound_rx.recv() => Wake::Chat(chat),
                Some(tick) = self.tick_rx.recv() => Wake::Tick(tick),
            };

            let event = match wake {
                Wake::Chat(Some(chat)) => Event::from(chat),
                Wake::Chat(None) => {
                    self.timer.cancel();
                    tracing::error!(channel = %self.session.channel, "Chat connection lost");
                    return Err(RuntimeError::ConnectionLost);
                }
                Wake::Tick(tick) => self.timeout_event(tick).await,
            };

            if self.process_event(event).await? == Flow::Stop {
                break;
            }
        }

        self.timer.cancel();
        tracing::info!(channel = %self.session.channel, "Dialogue runtime stopped");
        Ok(())
    }

    async fn process_event(&mut self, event: Event) -> Result<Flow, RuntimeError> {
        match transition(&self.session, &self.table, event) {
            Ok(result) => self.apply(result).await,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping event");
                Ok(Flow::Continue)
            }
        }
    }

    async fn apply(&mut self, result: TransitionResult) -> Result<Flow, RuntimeError> {
        let TransitionResult { session, effects } = result;

        if session.state != self.session.state || session.partner != self.session.partner {
            tracing::info!(
                from = %self.session.state,
                to = %session.state,
                partner = ?session.partner,
                "Dialogue advanced"
            );
        }

        // Committed before anything is sent: a failed send leaves the
        // dialogue advanced, never half-applied
        self.session = session;
        self.session_tx.send_replace(self.session.clone());

        let mut flow = Flow::Continue;
        for effect in effects {
            if self.execute_effect(effect).await? == Flow::Stop {
                flow = Flow::Stop;
            }
        }
        Ok(flow)
    }

    /// Execute an effect
    async fn execute_effect(&mut self, effect: Effect) -> Result<Flow, RuntimeError> {
        match effect {
            Effect::CancelTimer => {
                if let Some(generation) = self.timer.live_generation() {
                    tracing::debug!(generation, "Cancelling timer");
                }
                self.timer.cancel();
            }

            Effect::Pause => {
                let delay = self
                    .rng
                    .gen_range(self.timings.reply_delay_min..=self.timings.reply_delay_max);
                tokio::time::sleep(delay).await;
            }

            Effect::Say { state, to } => {
                let phrase = self.phrases.select(state, &mut self.rng)?.to_string();
                self.deliver(to.as_deref(), &phrase).await;
            }

            Effect::Farewell { to } => self.deliver(to.as_deref(), FAREWELL).await,

            Effect::ReportParticipants => self.report_participants().await,

            Effect::ArmTimer { kind, generation } => {
                let duration = match kind {
                    TimerKind::Turn => self.timings.turn_timeout,
                    TimerKind::InitialWait => self.timings.initial_wait,
                };
                tracing::debug!(?kind, generation, ?duration, "Arming timer");
                self.timer.arm(duration, generation);
            }

            Effect::Shutdown => return Ok(Flow::Stop),
        }

        Ok(Flow::Continue)
    }

    /// Turn a timer tick into an event, picking someone to address if needed
    async fn timeout_event(&mut self, tick: TimerTick) -> Event {
        let stand_in =
            if tick.generation == self.session.generation && self.session.partner.is_none() {
                self.pick_stand_in().await
            } else {
                None
            };

        Event::Timeout {
            generation: tick.generation,
            stand_in,
        }
    }

    async fn pick_stand_in(&mut self) -> Option<String> {
        let own = self.transport.nickname();
        let mut candidates = match self.transport.roster(&self.session.channel).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch roster");
                return None;
            }
        };
        candidates.retain(|nick| !irc_eq(nick, &own));
        candidates.sort();

        let pick = candidates.choose(&mut self.rng).cloned();
        if pick.is_none() {
            tracing::info!(channel = %self.session.channel, "Nobody to reach out to");
        }
        pick
    }

    async fn report_participants(&self) {
        let mut roster = match self.transport.roster(&self.session.channel).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch roster");
                return;
            }
        };
        roster.sort();

        self.deliver(None, PARTICIPANTS_HEADER).await;
        self.deliver(None, &roster.join(", ")).await;
    }

    /// Send a line to the channel, addressed to `to` when given
    async fn deliver(&self, to: Option<&str>, text: &str) {
        let line = match to {
            Some(nick) => format!("{nick}: {text}"),
            None => text.to_string(),
        };

        match self
            .transport
            .send_message(&self.session.channel, &line)
            .await
        {
            Ok(()) => tracing::debug!(line = %line, "Sent message"),
            Err(e) => tracing::warn!(error = %e, line = %line, "Failed to send message"),
        }
    }
}
