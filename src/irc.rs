//! IRC transport adapter
//!
//! Speaks just enough of the client protocol to sit in one channel: register,
//! join, keep the roster, exchange PRIVMSG lines, and come back after the
//! server drops the link.

mod client;
mod message;
mod protocol;

pub use client::{connect, ReconnectPolicy};
