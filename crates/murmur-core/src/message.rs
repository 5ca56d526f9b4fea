//! Chat messages, conversation names and the outbound message queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock;

/// Delivery status carried by a `MessageStatus` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Status not reported by the host.
    #[default]
    Unknown,
    /// The bot is sending this message.
    Sending,
    /// The bot's message was delivered.
    Sent,
    /// A message arrived from someone else.
    Received,
    /// The message was read.
    Read,
}

/// An incoming or outgoing chat message as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Conversation name, possibly in `display;id` form.
    pub chat: String,
    /// Handle of the user who wrote the message.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl ChatMessage {
    /// Creates a message stamped with the current time.
    pub fn new(chat: impl Into<String>, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            sender: sender.into(),
            body: body.into(),
            timestamp: clock::now(),
        }
    }

    /// Overrides the timestamp.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Parsed view of [`chat`](Self::chat).
    pub fn chat_name(&self) -> ChatName<'_> {
        ChatName::parse(&self.chat)
    }
}

// ─── ChatName ────────────────────────────────────────────────────────────────

/// A conversation name split into its display and id parts.
///
/// Hosts name group conversations `display;id`, e.g.
/// `#alice/$bob;0123456789abcdef`. Names without a `;` have neither part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatName<'a> {
    full: &'a str,
    parts: Option<(&'a str, &'a str)>,
}

impl<'a> ChatName<'a> {
    /// Splits on the last `;`.
    pub fn parse(full: &'a str) -> Self {
        Self {
            full,
            parts: full.rsplit_once(';'),
        }
    }

    /// The name exactly as the host reported it.
    pub fn full(&self) -> &'a str {
        self.full
    }

    /// The part before the last `;`.
    pub fn display(&self) -> Option<&'a str> {
        self.parts.map(|(display, _)| display)
    }

    /// The part after the last `;`.
    pub fn id(&self) -> Option<&'a str> {
        self.parts.map(|(_, id)| id)
    }
}

// ─── Outbound messages ───────────────────────────────────────────────────────

/// A message a plugin wants the host to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target conversation.
    pub chat: String,
    /// Text to send.
    pub text: String,
    /// When the plugin queued the message.
    pub timestamp: f64,
}

impl OutboundMessage {
    /// Creates a message stamped with the current time.
    pub fn new(chat: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            text: text.into(),
            timestamp: clock::now(),
        }
    }
}

/// Per-plugin queue of outbound messages.
///
/// Plugins push from any thread; the runtime drains the queue on its flush
/// interval and hands the messages to the host.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Mutex<Vec<OutboundMessage>>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message.
    pub fn push(&self, message: OutboundMessage) {
        self.queue.lock().push(message);
    }

    /// Queues `text` for `chat`.
    pub fn send(&self, chat: impl Into<String>, text: impl Into<String>) {
        self.push(OutboundMessage::new(chat, text));
    }

    /// Takes every queued message, oldest first.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
