//! The chat client side of the runtime.
//!
//! A [`Host`] delivers outbound messages and knows which conversations
//! exist. Incoming events go the other way, from the host's event source
//! into [`BotRuntime::router`](crate::BotRuntime::router).

use async_trait::async_trait;
use murmur_core::{BoxError, OutboundMessage};
use thiserror::Error;

/// Delivery failures reported by a [`Host`].
#[derive(Error, Debug)]
pub enum HostError {
    /// The conversation does not exist or is not joined.
    #[error("Unknown chat: {0}")]
    UnknownChat(String),

    /// The host is no longer connected to its chat client.
    #[error("Host is detached")]
    Detached,

    #[error("Failed to send message: {0}")]
    Send(#[source] BoxError),
}

impl HostError {
    pub fn send(err: impl Into<BoxError>) -> Self {
        Self::Send(err.into())
    }
}

/// A chat client the runtime delivers messages through.
#[async_trait]
pub trait Host: Send + Sync {
    /// Delivers one queued message.
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), HostError>;

    /// Names of the conversations currently known to the client.
    ///
    /// Answers `request_chats_list`.
    async fn chats(&self) -> Vec<String>;

    /// Whether the client is still connected. The runtime stops once this
    /// turns `false`.
    fn is_attached(&self) -> bool {
        true
    }
}
