//! # Murmur
//!
//! A plugin-orchestration runtime for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  event name, args  ┌─────────────┐     ┌───────────────────────────┐
//! │    Host    │───────────────────▶│ EventRouter │────▶│ plugins, by priority      │
//! │ (chat app) │                    └─────────────┘     │ (args flow down the chain)│
//! └────────────┘                                        └─────────────┬─────────────┘
//!       ▲                                                             │
//!       │ flush                  SignalBus ◄── cross-plugin queries ──┤
//!       └──── BotRuntime ◄────── Outbox    ◄── replies ───────────────┤
//!                                Cache     ◄── memoization ───────────┘
//! ```
//!
//! - **Core** (`murmur-core`): events, arguments, TTL caches, the signal bus
//! - **Framework** (`murmur-framework`): plugins, registry, router, commands
//! - **Runtime** (`murmur-runtime`): config, logging, host loop
//!
//! ## Writing a plugin
//!
//! ```rust,ignore
//! use murmur::prelude::*;
//!
//! #[distributed_slice(PLUGIN_REGISTRY)]
//! #[linkme(crate = murmur::linkme)]
//! static ROLL: PluginDescriptor = PluginDescriptor::new("roll", create);
//!
//! fn create(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
//!     let sides: u32 = ctx.option("sides")?.unwrap_or(6);
//!     let commands = CommandSet::new().command("!roll", "Rolls a die", move |ctx, msg, _| {
//!         ctx.send_message(&msg.chat, format!("{}", sides));
//!     });
//!     Ok(Plugin::builder(ctx.name())
//!         .usage("!roll")
//!         .on(EventKind::MessageStatus, commands.into_handler())
//!         .build())
//! }
//! ```
//!
//! ## Features
//!
//! - `builtin-plugins` *(default)*: the `maintenance` plugin
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use murmur_core as core;
pub use murmur_framework as framework;
pub use murmur_runtime as runtime;

pub use murmur_framework::linkme;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use murmur::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use murmur_runtime::{
        BotRuntime, ConfigLoader, Host, HostError, MurmurConfig, RuntimeError, RuntimeResult,
    };

    // Plugins
    pub use murmur_framework::linkme::distributed_slice;
    pub use murmur_framework::plugin::{
        PLUGIN_REGISTRY, Plugin, PluginContext, PluginDescriptor, PluginEntry, PluginOptions,
        PluginRegistry,
    };
    pub use murmur_framework::{CommandSet, EventRouter, PluginError, PluginResult};

    // Events and services
    pub use murmur_core::{
        Args, Cache, CacheExt, ChatMessage, EventKind, Flow, MessageStatus, OutboundMessage,
        Payload, Reference, SignalBus, args,
    };
}
