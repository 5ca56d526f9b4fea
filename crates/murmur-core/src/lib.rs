//! # Murmur Core
//!
//! Foundation types of the murmur plugin runtime.
//!
//! This crate has no knowledge of plugins or hosts. It provides the pieces
//! every other layer builds on:
//!
//! - **Events**: the host's event vocabulary ([`EventKind`]) and the typed
//!   argument tuples passed along a handler chain ([`Args`], [`Flow`])
//! - **Messages**: incoming chat messages ([`ChatMessage`]), conversation
//!   names ([`ChatName`]) and the per-plugin [`Outbox`]
//! - **Cache**: a TTL key-value store with memory and SQLite backends
//!   ([`cache`])
//! - **Signals**: a weakly referencing publish/subscribe bus ([`signal`])
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              murmur-framework               │
//! │  plugins · registry · router · scheduler     │
//! └──────┬───────────────┬───────────────┬───────┘
//!        ▼               ▼               ▼
//!   ┌─────────┐    ┌───────────┐   ┌────────────┐
//!   │  cache  │    │  signal   │   │ event/args │
//!   └─────────┘    └───────────┘   └────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use murmur_core::prelude::*;
//! use serde_json::json;
//!
//! let caches = CacheManager::new();
//! let cache = caches.get_cache("twitch")?;
//! cache.set("streams", &vec!["speedrun"], Some(300.0))?;
//!
//! let bus = SignalBus::new();
//! let answer = receiver(|_: &Payload| Ok(json!("pong")));
//! bus.connect(&answer, "ping", Reference::Weak);
//! assert_eq!(bus.send("ping", &Payload::new())?, vec![json!("pong")]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod args;
pub mod cache;
pub mod clock;
pub mod error;
pub mod event;
pub mod message;
pub mod signal;

pub use args::{Arg, ArgKind, Args, Flow};
pub use cache::{
    Cache, CacheBackend, CacheConfig, CacheExt, CacheKey, CacheManager, MemoryCache, SqliteCache,
};
pub use error::{BoxError, CacheError, CacheResult, SignalError, SignalResult, UnknownEvent};
pub use event::{EventKind, camel_to_snake};
pub use message::{ChatMessage, ChatName, MessageStatus, OutboundMessage, Outbox};
pub use signal::{ConnectionId, Payload, Receiver, Reference, SignalBus};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::args::{Arg, ArgKind, Args, Flow};
    pub use crate::cache::{Cache, CacheConfig, CacheExt, CacheKey, CacheManager};
    pub use crate::event::EventKind;
    pub use crate::message::{ChatMessage, MessageStatus, OutboundMessage};
    pub use crate::signal::{Payload, Reference, SignalBus, receiver};
}
