//! # Murmur Runtime
//!
//! Configuration, logging and the main loop of a murmur bot.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`config`] | layered `figment` loading of [`MurmurConfig`], plus validation |
//! | [`logging`] | `tracing-subscriber` setup driven by [`LoggingConfig`](config::LoggingConfig) |
//! | [`Host`] | the chat client: delivers messages, lists conversations |
//! | [`BotRuntime`] | builds services and plugins, flushes outboxes, shuts down |
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use murmur_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> RuntimeResult<()> {
//!     let runtime = BotRuntime::from_loader(ConfigLoader::new(), &PluginRegistry::with_linked())?;
//!     runtime.run(Arc::new(MyHost::connect().await)).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, MurmurConfig, validate_config};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{Host, HostError};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::BotRuntime;

pub mod prelude {
    pub use murmur_framework::plugin::PluginRegistry;

    pub use crate::config::{ConfigLoader, MurmurConfig};
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::host::{Host, HostError};
    pub use crate::runtime::BotRuntime;
}
