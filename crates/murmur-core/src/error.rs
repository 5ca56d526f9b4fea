//! Unified error types for the murmur core.
//!
//! Framework-level errors (plugin loading, routing) are defined in
//! `murmur-framework`; runtime errors live in `murmur-runtime`.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type returned by signal receivers and plugin callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors that can occur in cache operations.
///
/// A missing, expired or undecodable entry is **not** an error: `get` returns
/// `Ok(None)` for all three.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The persistent backend failed to open, create or query its database.
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The value could not be serialized for storage.
    #[error("failed to serialize cache value: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The configured location cannot hold a persistent cache.
    #[error("invalid cache location '{}': {reason}", location.display())]
    InvalidLocation {
        /// The rejected location.
        location: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Creating the directory that holds the cache file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Creates an invalid-location error.
    pub fn invalid_location(location: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// Signal Errors
// =============================================================================

/// Errors that can occur while sending a signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A receiver returned an error. The send was aborted at that receiver.
    #[error("receiver for signal '{signal}' failed: {source}")]
    Receiver {
        /// The signal being sent.
        signal: String,
        /// The receiver's error.
        #[source]
        source: BoxError,
    },
}

/// Result type for signal operations.
pub type SignalResult<T> = Result<T, SignalError>;

// =============================================================================
// Event Errors
// =============================================================================

/// An event name outside the host's known event vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event: {0}")]
pub struct UnknownEvent(pub String);
