//! Built-in plugins shipped with the murmur framework.
//!
//! These plugins are enabled by the `builtin` feature flag (on by default)
//! and contribute themselves to [`PLUGIN_REGISTRY`](super::PLUGIN_REGISTRY).
//!
//! | Plugin | Name | Description |
//! |--------|------|-------------|
//! | [`MAINTENANCE`] | `"maintenance"` | `!plugins`, `!help`, `!commands`, `!version` |
//!
//! # Enabling built-in plugins
//!
//! ```toml
//! [[plugins]]
//! name = "maintenance"
//! priority = 100
//! ```

pub mod maintenance;

pub use maintenance::MAINTENANCE;
