//! Plugin model.
//!
//! # Architecture
//!
//! A plugin is a named set of event handlers plus an optional unload hook.
//! It is produced by a factory registered under a string name:
//!
//! ```text
//! config [[plugins]] ──name──► PluginRegistry ──► PluginDescriptor
//!                                                    │ create(ctx)
//!                                                    ▼
//!                            PluginContext ◄──── Plugin (handlers, usage)
//!                  (options · cache · signals · outbox · scheduler)
//! ```
//!
//! The [`PluginContext`] is built by the manager before the factory runs, so
//! the factory can read options, warm its cache, connect signal receivers and
//! schedule periodic tasks.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use murmur::prelude::*;
//!
//! fn create(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
//!     let greeting: String = ctx.option("greeting")?.unwrap_or_else(|| "hi".into());
//!     Ok(Plugin::builder(ctx.name())
//!         .usage("Greets everyone who says hello")
//!         .on(EventKind::MessageStatus, move |ctx, args| {
//!             if let Some(msg) = args.message()
//!                 && msg.body.eq_ignore_ascii_case("hello")
//!             {
//!                 ctx.send_message(&msg.chat, &greeting);
//!             }
//!             Flow::Unchanged
//!         })
//!         .build())
//! }
//!
//! #[linkme::distributed_slice(PLUGIN_REGISTRY)]
//! #[linkme(crate = murmur::linkme)]
//! static GREETER: PluginDescriptor = PluginDescriptor::new("greeter", create);
//! ```

mod config;
mod core;
mod descriptor;
mod registry;

#[cfg(feature = "builtin")]
pub mod builtin;

pub use config::{PluginEntry, PluginOptions};
pub use self::core::{HandlerFn, Plugin, PluginBuilder, PluginContext, UnloadFn};
pub use descriptor::{CreateFn, PluginDescriptor};
pub use registry::{PLUGIN_REGISTRY, PluginRegistry};
