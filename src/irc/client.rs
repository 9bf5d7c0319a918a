//! IRC connection over TCP
//!
//! One task owns the socket. It writes queued lines, parses what the server
//! sends, keeps the protocol state current and forwards chat to the dialogue.
//! When the server drops the link it reconnects with backoff, re-registers
//! and re-joins; the dialogue's channels survive across sockets.

use super::message::IrcMessage;
use super::protocol::{Action, ProtocolState};
use crate::config::ServerAddress;
use crate::runtime::{ChatTransport, TransportError};
use crate::state_machine::ChatEvent;
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

/// Servers cap lines at 512 bytes; leave room for IRCv3 tags
const MAX_LINE_LENGTH: usize = 8192;
const CHANNEL_CAPACITY: usize = 64;

type Socket = Framed<TcpStream, LinesCodec>;
type Sink = SplitSink<Socket, String>;

impl From<LinesCodecError> for TransportError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(e) => TransportError::Io(e),
            LinesCodecError::MaxLineLengthExceeded => {
                TransportError::Protocol("line too long".to_string())
            }
        }
    }
}

fn lock(state: &Mutex<ProtocolState>) -> MutexGuard<'_, ProtocolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_quit(line: &str) -> bool {
    line.starts_with("QUIT")
}

/// Backoff between reconnect attempts, doubling up to `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(300),
        }
    }
}

impl ReconnectPolicy {
    fn after(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max)
    }
}

/// Sending half of the connection, shared with the dialogue
pub struct IrcTransport {
    state: Arc<Mutex<ProtocolState>>,
    outbound_tx: mpsc::Sender<String>,
}

impl IrcTransport {
    async fn send_raw(&self, line: String) -> Result<(), TransportError> {
        self.outbound_tx
            .send(line)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Leave the network; the connection task stops instead of reconnecting
    pub async fn quit(&self, message: &str) -> Result<(), TransportError> {
        tracing::info!(reason = message, "Quitting");
        self.send_raw(format!("QUIT :{message}")).await
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError> {
        // One PRIVMSG per line; the protocol has no multi-line messages
        for line in text.lines().filter(|line| !line.is_empty()) {
            self.send_raw(format!("PRIVMSG {target} :{line}")).await?;
        }
        Ok(())
    }

    async fn roster(&self, channel: &str) -> Result<Vec<String>, TransportError> {
        Ok(lock(&self.state).roster(channel))
    }

    fn nickname(&self) -> String {
        lock(&self.state).nickname().to_string()
    }
}

/// The task driving the socket
pub struct IrcTasks {
    link: JoinHandle<()>,
}

impl IrcTasks {
    /// Wait for the link to wind down, aborting it after `grace`.
    ///
    /// The link ends once QUIT has been written and every transport handle
    /// is dropped, or when the server closes the socket after QUIT.
    pub async fn finish(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.link).await.is_err() {
            tracing::warn!(?grace, "IRC link did not close in time");
            self.link.abort();
        }
    }
}

/// A connection to the server and the dialogue's ends of it
pub struct IrcConnection {
    pub transport: Arc<IrcTransport>,
    pub inbound_rx: mpsc::Receiver<ChatEvent>,
    pub tasks: IrcTasks,
}

/// Connect and start registration; the channel is joined once the server
/// welcomes us.
///
/// Failing to reach the server the first time is an error. Later
/// disconnects are retried according to `policy`.
pub async fn connect(
    server: &ServerAddress,
    nickname: &str,
    channel: &str,
    policy: ReconnectPolicy,
) -> Result<IrcConnection, TransportError> {
    let socket = open(server).await?;

    let state = Arc::new(Mutex::new(ProtocolState::new(nickname, channel)));
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let link = Link {
        server: server.clone(),
        state: state.clone(),
        outbound_rx,
        inbound_tx,
        policy,
    };

    Ok(IrcConnection {
        transport: Arc::new(IrcTransport { state, outbound_tx }),
        inbound_rx,
        tasks: IrcTasks {
            link: tokio::spawn(link.run(socket)),
        },
    })
}

async fn open(server: &ServerAddress) -> Result<Socket, TransportError> {
    tracing::info!(host = %server.host, port = server.port, "Connecting to IRC server");
    let stream = TcpStream::connect((server.host.as_str(), server.port)).await?;
    Ok(Framed::new(
        stream,
        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
    ))
}

async fn write(sink: &mut Sink, line: &str) -> Result<(), TransportError> {
    tracing::trace!(line = %line, "irc >>");
    // LinesCodec terminates with \n only
    sink.send(format!("{line}\r")).await?;
    Ok(())
}

/// How one socket's session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hangup {
    /// The server went away; reconnect
    Lost,
    /// We quit, or nobody is listening any more; stop
    Done,
}

struct Link {
    server: ServerAddress,
    state: Arc<Mutex<ProtocolState>>,
    outbound_rx: mpsc::Receiver<String>,
    inbound_tx: mpsc::Sender<ChatEvent>,
    policy: ReconnectPolicy,
}

impl Link {
    async fn run(mut self, mut socket: Socket) {
        let mut delay = self.policy.initial;

        loop {
            let (hangup, registered) = self.serve(socket).await;
            if hangup == Hangup::Done {
                break;
            }
            if registered {
                delay = self.policy.initial;
            }

            socket = loop {
                tracing::warn!(?delay, "Disconnected from IRC server, reconnecting");
                if !self.sit_out(delay).await {
                    tracing::info!("IRC link closed");
                    return;
                }
                delay = self.policy.after(delay);

                match open(&self.server).await {
                    Ok(socket) => break socket,
                    Err(e) => tracing::warn!(error = %e, "Reconnect failed"),
                }
            };
        }

        // Dropping inbound_tx here tells the dialogue the connection is gone
        tracing::info!("IRC link closed");
    }

    /// Register on a fresh socket and pump lines until it closes.
    /// Also reports whether the server welcomed us on it.
    async fn serve(&mut self, socket: Socket) -> (Hangup, bool) {
        let (mut sink, mut lines) = socket.split();
        let mut registered = false;
        let mut quitting = false;

        let registration = {
            let mut state = lock(&self.state);
            state.reset_session();
            state.registration()
        };
        for line in registration {
            if let Err(e) = write(&mut sink, &line).await {
                tracing::error!(error = %e, "Failed to register");
                return (Hangup::Lost, false);
            }
        }

        let lost = |quitting: bool| {
            if quitting {
                Hangup::Done
            } else {
                Hangup::Lost
            }
        };

        loop {
            tokio::select! {
                outbound = self.outbound_rx.recv() => {
                    let Some(line) = outbound else {
                        return (Hangup::Done, registered);
                    };
                    quitting |= is_quit(&line);
                    if let Err(e) = write(&mut sink, &line).await {
                        tracing::error!(error = %e, "Failed to write to server");
                        return (lost(quitting), registered);
                    }
                }

                incoming = lines.next() => {
                    let line = match incoming {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            tracing::error!(error = %TransportError::from(e), "Failed to read from server");
                            return (lost(quitting), registered);
                        }
                        None => {
                            tracing::info!("Server closed the connection");
                            return (lost(quitting), registered);
                        }
                    };
                    tracing::trace!(line = %line, "irc <<");

                    let Some(message) = IrcMessage::parse(&line) else {
                        tracing::debug!(line = %line, "Ignoring unparseable line");
                        continue;
                    };

                    match message.command.as_str() {
                        "001" => registered = true,
                        "ERROR" => {
                            tracing::warn!(reason = ?message.param(0), "Server closing link");
                        }
                        _ => {}
                    }

                    let actions = lock(&self.state).handle(&message);
                    for action in actions {
                        match action {
                            Action::Send(reply) => {
                                if let Err(e) = write(&mut sink, &reply).await {
                                    tracing::error!(error = %e, "Failed to write to server");
                                    return (lost(quitting), registered);
                                }
                            }
                            Action::Deliver(event) => {
                                if self.inbound_tx.send(event).await.is_err() {
                                    return (Hangup::Done, registered);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Wait out a backoff delay. Lines queued meanwhile are dropped; a QUIT
    /// or a closed queue means nobody wants the link back.
    async fn sit_out(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return true,
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(line) if !is_quit(&line) => {
                        tracing::warn!(line = %line, "Not connected, dropping line");
                    }
                    _ => return false,
                },
            }
        }
    }
}
