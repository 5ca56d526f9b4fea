//! Error types for the murmur framework.

use murmur_core::{BoxError, CacheError};
use thiserror::Error;

// =============================================================================
// Plugin Errors
// =============================================================================

/// Errors raised while building the plugin set.
///
/// Every variant is fatal to [`PluginManager::load`](crate::PluginManager::load):
/// no partially loaded manager is ever returned.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No factory is registered under the configured name.
    #[error("no plugin named '{name}' is registered")]
    Unresolved {
        /// The configured name.
        name: String,
    },

    /// The same name appears twice in the plugin list.
    #[error("plugin '{name}' is configured more than once")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// The plugin's factory returned an error.
    #[error("plugin '{name}' failed to initialize: {source}")]
    Factory {
        /// The plugin being created.
        name: String,
        /// What went wrong.
        #[source]
        source: BoxError,
    },

    /// The plugin's options do not have the shape it expects.
    #[error("invalid options for plugin '{name}': {source}")]
    InvalidOptions {
        /// The plugin whose options were rejected.
        name: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// The plugin's cache could not be created.
    #[error("cache for plugin '{name}' is unavailable: {source}")]
    Cache {
        /// The plugin owning the cache.
        name: String,
        /// Backend failure.
        #[source]
        source: CacheError,
    },

    /// A periodic task could not be scheduled.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl PluginError {
    /// Wraps an arbitrary factory failure.
    pub fn factory(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Factory {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Creates an invalid-options error.
    pub fn invalid_options(name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidOptions {
            name: name.into(),
            source,
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

// =============================================================================
// Scheduler Errors
// =============================================================================

/// Errors returned by [`Scheduler::spawn_periodic`](crate::Scheduler::spawn_periodic).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Called outside a tokio runtime.
    #[error("cannot schedule '{task}': no tokio runtime is running")]
    NoRuntime {
        /// Name of the task.
        task: String,
    },

    /// The scheduler was already shut down.
    #[error("cannot schedule '{task}': scheduler is shut down")]
    ShutDown {
        /// Name of the task.
        task: String,
    },

    /// A zero period would spin.
    #[error("cannot schedule '{task}': period must be greater than zero")]
    ZeroPeriod {
        /// Name of the task.
        task: String,
    },
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
