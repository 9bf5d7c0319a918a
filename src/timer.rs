//! Single-shot turn timer
//!
//! At most one timer is live per session. Arming always cancels the previous
//! one first. A firing timer only posts a tick into the runtime's queue; the
//! tick is checked against the session generation before it can do anything,
//! so a tick that races its own cancellation is discarded.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Posted when a timer runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub generation: u64,
}

struct LiveTimer {
    generation: u64,
    cancel: CancellationToken,
}

/// The session's one cancelable timer
pub struct TurnTimer {
    tick_tx: mpsc::Sender<TimerTick>,
    live: Option<LiveTimer>,
}

impl TurnTimer {
    pub fn new(tick_tx: mpsc::Sender<TimerTick>) -> Self {
        Self {
            tick_tx,
            live: None,
        }
    }

    /// Start a timer for `generation`, replacing any live one
    pub fn arm(&mut self, duration: Duration, generation: u64) {
        self.cancel();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tick_tx = self.tick_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::trace!(generation, "Timer cancelled");
                }
                () = tokio::time::sleep(duration) => {
                    tracing::debug!(generation, "Timer fired");
                    let _ = tick_tx.send(TimerTick { generation }).await;
                }
            }
        });

        self.live = Some(LiveTimer { generation, cancel });
    }

    /// Cancel the live timer; a no-op if it already fired or was cancelled
    pub fn cancel(&mut self) {
        if let Some(live) = self.live.take() {
            live.cancel.cancel();
        }
    }

    /// Generation of the most recently armed timer still tracked
    pub fn live_generation(&self) -> Option<u64> {
        self.live.as_ref().map(|live| live.generation)
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
