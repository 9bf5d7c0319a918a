//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Transport failures; logged by the runtime, never fatal to a turn
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection closed")]
    Closed,
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Chat network the dialogue runs over
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one line of text to a channel or nick
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError>;

    /// Identities currently present in `channel`
    async fn roster(&self, channel: &str) -> Result<Vec<String>, TransportError>;

    /// The bot's own current nickname
    fn nickname(&self) -> String;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError> {
        (**self).send_message(target, text).await
    }

    async fn roster(&self, channel: &str) -> Result<Vec<String>, TransportError> {
        (**self).roster(channel).await
    }

    fn nickname(&self) -> String {
        (**self).nickname()
    }
}
