//! Chat commands: `!word rest of line`.
//!
//! A [`CommandSet`] turns a plugin's `MessageStatus` handler into a command
//! dispatcher. Only messages with status `Received` are inspected; the first
//! word of the body is matched against the registered commands ignoring
//! case, and the callback gets the message plus the remaining text.
//!
//! ```rust,ignore
//! let commands = CommandSet::new()
//!     .command("!roll", "Rolls a die", |ctx, msg, rest| {
//!         ctx.send_message(&msg.chat, roll(rest));
//!     });
//!
//! Plugin::builder(ctx.name())
//!     .on(EventKind::MessageStatus, commands.into_handler())
//!     .build()
//! ```
//!
//! The handler never changes the argument chain.

use std::fmt;
use std::sync::Arc;

use murmur_core::{Args, ChatMessage, Flow, MessageStatus};
use tracing::debug;

use crate::plugin::PluginContext;

/// Callback run for a matched command: context, message, text after the command word.
pub type CommandFn = Arc<dyn Fn(&PluginContext, &ChatMessage, &str) + Send + Sync>;

struct Command {
    word: String,
    help: String,
    callback: CommandFn,
}

/// Ordered set of chat commands.
#[derive(Default)]
pub struct CommandSet {
    commands: Vec<Command>,
}

impl fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.commands.iter().map(|c| &c.word))
            .finish()
    }
}

/// Splits a message body into its command word and the rest.
fn split_command(body: &str) -> (&str, &str) {
    let body = body.trim_start();
    match body.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (body, ""),
    }
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. `word` is matched ignoring case; a later command with
    /// the same word replaces the earlier one.
    pub fn command<F>(mut self, word: impl Into<String>, help: impl Into<String>, f: F) -> Self
    where
        F: Fn(&PluginContext, &ChatMessage, &str) + Send + Sync + 'static,
    {
        let word = word.into().to_lowercase();
        self.commands.retain(|c| c.word != word);
        self.commands.push(Command {
            word,
            help: help.into(),
            callback: Arc::new(f),
        });
        self
    }

    /// `(word, help)` for every command, in registration order.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.commands
            .iter()
            .map(|c| (c.word.as_str(), c.help.as_str()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Runs the command named by a received message, if any.
    ///
    /// Returns `true` if a command ran.
    pub fn handle(&self, ctx: &PluginContext, args: &Args) -> bool {
        if args.status() != Some(MessageStatus::Received) {
            return false;
        }
        let Some(message) = args.message() else {
            return false;
        };

        let (word, rest) = split_command(&message.body);
        let word = word.to_lowercase();
        let Some(command) = self.commands.iter().find(|c| c.word == word) else {
            return false;
        };

        debug!(plugin = %ctx.name(), command = %command.word, chat = %message.chat, "Running chat command");
        (command.callback)(ctx, message, rest);
        true
    }

    /// Wraps the set as a `MessageStatus` handler.
    pub fn into_handler(self) -> impl Fn(&PluginContext, Args) -> Flow + Send + Sync + 'static {
        move |ctx, args| {
            self.handle(ctx, &args);
            Flow::Unchanged
        }
    }
}
