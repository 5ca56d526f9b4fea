//! Runtime error types.

use murmur_core::CacheError;
use murmur_framework::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running a [`BotRuntime`](crate::BotRuntime).
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Installing the Ctrl+C / SIGTERM listener failed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
