//! Typed argument tuples passed along a handler chain.
//!
//! Every event occurrence carries an [`Args`] tuple. Handlers receive the
//! current tuple and answer with a [`Flow`]:
//!
//! - [`Flow::Continue`] hands a (possibly modified) tuple to the next handler.
//! - [`Flow::Unchanged`] keeps the current tuple.
//!
//! The router compares [`Args::shape`] before and after each handler. A
//! `Continue` whose shape differs from its input is discarded and the last
//! known-good tuple carries on.
//!
//! ```rust
//! use murmur_core::args::ArgKind;
//! use murmur_core::message::{ChatMessage, MessageStatus};
//! use murmur_core::args;
//!
//! let args = args![ChatMessage::new("chat", "alice", "hi"), MessageStatus::Received];
//! assert_eq!(args.shape(), vec![ArgKind::Message, ArgKind::Status]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{ChatMessage, MessageStatus};

/// One positional event argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Message(ChatMessage),
    Status(MessageStatus),
    User(String),
    Chat(String),
    Text(String),
    Int(i64),
    Bool(bool),
    Json(Value),
}

/// Discriminant of an [`Arg`], used for shape comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Message,
    Status,
    User,
    Chat,
    Text,
    Int,
    Bool,
    Json,
}

impl Arg {
    /// The argument's kind.
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Message(_) => ArgKind::Message,
            Arg::Status(_) => ArgKind::Status,
            Arg::User(_) => ArgKind::User,
            Arg::Chat(_) => ArgKind::Chat,
            Arg::Text(_) => ArgKind::Text,
            Arg::Int(_) => ArgKind::Int,
            Arg::Bool(_) => ArgKind::Bool,
            Arg::Json(_) => ArgKind::Json,
        }
    }

    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Arg::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut ChatMessage> {
        match self {
            Arg::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<MessageStatus> {
        match self {
            Arg::Status(s) => Some(*s),
            _ => None,
        }
    }

    /// Borrowed text of a `User`, `Chat` or `Text` argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::User(s) | Arg::Chat(s) | Arg::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ChatMessage> for Arg {
    fn from(m: ChatMessage) -> Self {
        Arg::Message(m)
    }
}

impl From<MessageStatus> for Arg {
    fn from(s: MessageStatus) -> Self {
        Arg::Status(s)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Int(n)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Json(v)
    }
}

// ─── Args ────────────────────────────────────────────────────────────────────

/// An ordered tuple of event arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Arg>);

impl Args {
    /// The empty tuple.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Arg> {
        self.0.get_mut(index)
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.0.push(arg.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.0.iter()
    }

    /// Ordered kinds of the arguments.
    pub fn shape(&self) -> Vec<ArgKind> {
        self.0.iter().map(Arg::kind).collect()
    }

    /// Returns `true` if both tuples have the same arity and kinds.
    pub fn same_shape(&self, other: &Args) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.kind() == b.kind())
    }

    /// The first chat-message argument.
    pub fn message(&self) -> Option<&ChatMessage> {
        self.0.iter().find_map(Arg::as_message)
    }

    /// The first chat-message argument, mutably.
    pub fn message_mut(&mut self) -> Option<&mut ChatMessage> {
        self.0.iter_mut().find_map(Arg::as_message_mut)
    }

    /// The first message-status argument.
    pub fn status(&self) -> Option<MessageStatus> {
        self.0.iter().find_map(Arg::as_status)
    }

    pub fn into_inner(self) -> Vec<Arg> {
        self.0
    }
}

impl From<Vec<Arg>> for Args {
    fn from(v: Vec<Arg>) -> Self {
        Self(v)
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builds an [`Args`] tuple from values convertible into [`Arg`].
#[macro_export]
macro_rules! args {
    () => {
        $crate::args::Args::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::args::Args::from(vec![$($crate::args::Arg::from($arg)),+])
    };
}

// ─── Flow ────────────────────────────────────────────────────────────────────

/// Outcome of one handler in a dispatch chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Pass these arguments to the next handler.
    Continue(Args),
    /// Keep the arguments this handler received.
    Unchanged,
}

impl Flow {
    /// Shorthand for `Flow::Continue(args.into())`.
    pub fn next(args: impl Into<Args>) -> Self {
        Flow::Continue(args.into())
    }

    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Flow::Continue(_))
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Flow::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_args() -> Args {
        crate::args![
            ChatMessage::new("chat", "alice", "hello"),
            MessageStatus::Received
        ]
    }

    #[test]
    fn test_shape() {
        let args = message_args();
        assert_eq!(args.shape(), vec![ArgKind::Message, ArgKind::Status]);
        assert!(args.same_shape(&message_args()));
        assert!(!args.same_shape(&crate::args![5_i64]));
        assert!(!args.same_shape(&Args::new()));
        assert!(Args::new().same_shape(&crate::args![]));
    }

    #[test]
    fn test_message_accessors() {
        let mut args = message_args();
        assert_eq!(args.status(), Some(MessageStatus::Received));
        args.message_mut().unwrap().body.push_str(" world");
        assert_eq!(args.message().unwrap().body, "hello world");
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Arg::Chat("c".into()).as_str(), Some("c"));
        assert_eq!(Arg::Int(1).as_str(), None);
    }

    #[test]
    fn test_flow_helpers() {
        assert!(Flow::next(message_args()).is_continue());
        assert!(Flow::Unchanged.is_unchanged());
    }
}
