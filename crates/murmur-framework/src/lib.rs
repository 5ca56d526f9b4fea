//! # Murmur Framework
//!
//! Plugin orchestration on top of `murmur-core`.
//!
//! This layer provides:
//! - The plugin model: [`Plugin`](plugin::Plugin), its builder and
//!   [`PluginContext`](plugin::PluginContext)
//! - A name → factory [`PluginRegistry`](plugin::PluginRegistry), filled
//!   explicitly or from the link-time [`PLUGIN_REGISTRY`](plugin::PLUGIN_REGISTRY)
//! - [`PluginManager`]: loads the configured plugin list, fail-fast
//! - [`EventRouter`]: priority-ordered, mutation-passing dispatch with
//!   per-chat whitelists
//! - [`CommandSet`] for `!command` style plugins
//! - [`Scheduler`] for periodic plugin tasks
//! - Built-in plugins (with the `builtin` feature)
//!
//! ## Event flow
//!
//! ```text
//! host ──"MessageStatus", args──► EventRouter ──► plugin handlers (by priority)
//!                                                      │
//!                               SignalBus ◄────────────┤ queries
//!                               Cache     ◄────────────┤ memoization
//!                               Outbox    ◄────────────┘ replies
//! ```

pub mod command;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod router;
pub mod scheduler;
pub mod whitelist;

pub use command::{CommandFn, CommandSet};
pub use error::{PluginError, PluginResult, SchedulerError, SchedulerResult};
pub use manager::{LoadedPlugin, PluginManager, PluginServices, PluginState};
pub use router::{EventCallback, EventHandler, EventRouter};
pub use scheduler::Scheduler;
pub use whitelist::is_whitelisted;

/// Re-exported so downstream crates can contribute to
/// [`PLUGIN_REGISTRY`](plugin::PLUGIN_REGISTRY) without depending on `linkme`
/// directly.
pub use linkme;
