//! Configuration for the murmur runtime.
//!
//! Layered loading with `figment` (see [`loader`]), the [`MurmurConfig`]
//! schema and its validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogOutput, LoggingConfig, MurmurConfig, RuntimeSettings, SpanEventConfig,
};
pub use validation::validate_config;
