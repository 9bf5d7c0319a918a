//! Operator configuration
//!
//! Positional parameters follow the classic `<server[:port]> <channel> <nickname>`
//! shape; timings can be tuned with flags or environment variables.

use crate::state_machine::{DialogueState, EdgeKind};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 6667;

const NICK_MAX_LEN: usize = 16;
const NICK_STEM_LEN: usize = 12;
const NICK_SUFFIX: &str = "-bot";

/// Configuration problems are fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No {edge} edge defined for state {state}")]
    MissingEdge { state: DialogueState, edge: EdgeKind },
    #[error("END must be absorbing, but its {edge} edge leaves it")]
    TerminalEscapes { edge: EdgeKind },
    #[error("Follow-through state {state} leads into follow-through state {next}")]
    ChainedFollowThrough {
        state: DialogueState,
        next: DialogueState,
    },
    #[error("No phrases configured for reachable state {state}")]
    EmptyCatalog { state: DialogueState },
    #[error("Failed to read phrase file {path}: {source}")]
    PhraseFileIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid phrase file {path}: {source}")]
    PhraseFileFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Reply delay range is empty ({min:?} > {max:?})")]
    ReplyDelayRange { min: Duration, max: Duration },
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl std::str::FromStr for ServerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| "Erroneous port".to_string())?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err("Missing server host".to_string());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Command line for the bot
#[derive(Debug, Parser)]
#[command(name = "smalltalk-bot")]
#[command(about = "Chat bot that makes small talk on an IRC channel")]
#[command(version)]
pub struct Cli {
    /// Server to connect to, as host or host:port
    pub server: ServerAddress,

    /// Channel to join, e.g. #lobby
    pub channel: String,

    /// Desired nickname (a "-bot" suffix is enforced)
    pub nickname: String,

    /// Seconds to wait for a reply after speaking
    #[arg(long, env = "SMALLTALK_TURN_TIMEOUT_SECS", default_value_t = 30)]
    pub turn_timeout_secs: u64,

    /// Seconds to wait before the first outreach and after every reset
    #[arg(long, env = "SMALLTALK_INITIAL_WAIT_SECS", default_value_t = 35)]
    pub initial_wait_secs: u64,

    /// Shortest pause before answering
    #[arg(long, env = "SMALLTALK_REPLY_DELAY_MIN_SECS", default_value_t = 1)]
    pub reply_delay_min_secs: u64,

    /// Longest pause before answering
    #[arg(long, env = "SMALLTALK_REPLY_DELAY_MAX_SECS", default_value_t = 3)]
    pub reply_delay_max_secs: u64,

    /// JSON file replacing built-in phrases per state
    #[arg(long, env = "SMALLTALK_PHRASES")]
    pub phrases: Option<PathBuf>,
}

/// How long the dialogue waits at each step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub turn_timeout: Duration,
    pub initial_wait: Duration,
    pub reply_delay_min: Duration,
    pub reply_delay_max: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            initial_wait: Duration::from_secs(35),
            reply_delay_min: Duration::from_secs(1),
            reply_delay_max: Duration::from_secs(3),
        }
    }
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server: ServerAddress,
    pub channel: String,
    pub nickname: String,
    pub timings: Timings,
    pub phrases_path: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let timings = Timings {
            turn_timeout: Duration::from_secs(cli.turn_timeout_secs),
            initial_wait: Duration::from_secs(cli.initial_wait_secs),
            reply_delay_min: Duration::from_secs(cli.reply_delay_min_secs),
            reply_delay_max: Duration::from_secs(cli.reply_delay_max_secs),
        };

        if timings.reply_delay_min > timings.reply_delay_max {
            return Err(ConfigError::ReplyDelayRange {
                min: timings.reply_delay_min,
                max: timings.reply_delay_max,
            });
        }

        Ok(Self {
            server: cli.server,
            channel: cli.channel,
            nickname: normalize_nickname(&cli.nickname),
            timings,
            phrases_path: cli.phrases,
        })
    }
}

/// Make sure the bot identifies itself as one
///
/// At most 16 characters; a name not already ending in `-bot` is cut to 12
/// characters and gets the suffix.
pub fn normalize_nickname(nickname: &str) -> String {
    let nickname: String = nickname.chars().take(NICK_MAX_LEN).collect();
    if nickname.ends_with(NICK_SUFFIX) {
        return nickname;
    }

    let mut stem: String = nickname.chars().take(NICK_STEM_LEN).collect();
    stem.push_str(NICK_SUFFIX);
    stem
}
