//! Named publish/subscribe channels between plugins.
//!
//! Plugins query each other through signals instead of holding references to
//! one another. A plugin connects a [`Receiver`] under a signal name; anyone
//! holding the shared [`SignalBus`] can then [`send`](SignalBus::send) that
//! signal and collect one answer per connected receiver.
//!
//! # Reference modes
//!
//! | Mode | Bus holds | Connection ends when |
//! |------|-----------|----------------------|
//! | [`Reference::Weak`] | `Weak<dyn Receiver>` | the last outside `Arc` drops, or on disconnect |
//! | [`Reference::Strong`] | `Arc<dyn Receiver>` | explicit disconnect |
//!
//! # Reserved signals
//!
//! | Name | Answered by | Payload |
//! |------|-------------|---------|
//! | [`REQUEST_PLUGINS`] | plugin manager | none |
//! | [`REQUEST_USAGE`] | plugin manager | `kwargs.name` |
//! | [`REQUEST_CHATS`] | runtime, for the host | none |

mod bus;
mod payload;

pub use bus::{ConnectionId, Reference, SignalBus, receiver};
pub use payload::{Payload, Receiver, ReceiverResult};

/// Asks for the names of the loaded plugins, in configuration order.
pub const REQUEST_PLUGINS: &str = "request_plugins_list";

/// Asks for one plugin's usage text. The plugin is named by `kwargs.name`.
pub const REQUEST_USAGE: &str = "request_plugin_usage";

/// Asks for the conversations the host currently knows.
pub const REQUEST_CHATS: &str = "request_chats_list";
