//! Console Bot
//!
//! Drives the murmur runtime from the terminal: every line typed on stdin is
//! dispatched as a received `MessageStatus` event in one chat, and plugin
//! replies are printed back.
//!
//! ```text
//! stdin line ──► ChatMessage(Received) ──► router ──► plugins
//! stdout     ◄── ConsoleHost::send_message ◄── flush ◄── outboxes
//! ```
//!
//! Besides the built-in `maintenance` plugin this binary links a small
//! `echo` plugin:
//!
//! - `!echo <text>` repeats the text
//! - `!count` says how many messages the chat has seen
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --config murmur.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use murmur::prelude::*;
use murmur::runtime::logging;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

// ============================================================================
// Plugin
// ============================================================================

#[distributed_slice(PLUGIN_REGISTRY)]
#[linkme(crate = murmur::linkme)]
static ECHO: PluginDescriptor = PluginDescriptor::new("echo", create_echo);

fn create_echo(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
    let prefix: String = ctx.option("prefix")?.unwrap_or_default();

    let commands = CommandSet::new()
        .command("!echo", "Repeats the text", move |ctx, msg, rest| {
            ctx.send_message(&msg.chat, format!("{prefix}{rest}"));
        })
        .command("!count", "Counts messages in this chat", |ctx, msg, _| {
            let seen: u64 = ctx.cache().get(msg.chat.as_str()).ok().flatten().unwrap_or(0);
            ctx.send_message(&msg.chat, format!("{seen} messages so far"));
        });

    Ok(Plugin::builder(ctx.name())
        .usage("!echo <text>, !count")
        .on(EventKind::MessageStatus, move |ctx, args| {
            if let Some(msg) = args.message() {
                let seen: u64 = ctx.cache().get(msg.chat.as_str()).ok().flatten().unwrap_or(0);
                if let Err(e) = ctx.cache().set(msg.chat.as_str(), &(seen + 1), Some(0.0)) {
                    warn!(error = %e, "Failed to update message count");
                }
            }
            commands.handle(ctx, &args);
            Flow::Unchanged
        })
        .build())
}

// ============================================================================
// Host
// ============================================================================

/// Prints outbound messages and knows a single chat.
struct ConsoleHost {
    chat: String,
    attached: AtomicBool,
}

#[async_trait]
impl Host for ConsoleHost {
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), HostError> {
        if message.chat != self.chat {
            return Err(HostError::UnknownChat(message.chat.clone()));
        }
        println!("[bot] {}", message.text);
        Ok(())
    }

    async fn chats(&self) -> Vec<String> {
        vec![self.chat.clone()]
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Main
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "console-bot", about = "Chat with murmur plugins from the terminal")]
struct Cli {
    /// Configuration file; searched in the usual locations when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long)]
    profile: Option<String>,

    /// Chat the console speaks in.
    #[arg(long, default_value = "#console/$you;0000")]
    chat: String,

    /// Sender name for typed lines.
    #[arg(short, long, default_value = "you")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load_validated()?;
    logging::init_from_config(&config.logging);

    if config.plugins.is_empty() {
        info!("No plugins configured, loading maintenance and echo");
        config.plugins = vec![PluginEntry::new("maintenance"), PluginEntry::new("echo")];
    }

    let runtime = BotRuntime::from_config(config, &PluginRegistry::with_linked())?;
    let host = Arc::new(ConsoleHost {
        chat: cli.chat.clone(),
        attached: AtomicBool::new(true),
    });

    let reader = {
        let router = Arc::clone(runtime.router());
        let host = Arc::clone(&host);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        let message = ChatMessage::new(&cli.chat, &cli.user, line);
                        debug!(chat = %message.chat, "Console input");
                        router.dispatch("MessageStatus", args![message, MessageStatus::Received]);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            host.attached.store(false, Ordering::SeqCst);
        })
    };

    println!("Type a message, '!commands' for help, Ctrl+D to quit.");
    runtime.run(host).await?;
    reader.abort();
    Ok(())
}
