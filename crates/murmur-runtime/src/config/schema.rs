//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! murmur_core = "warn"
//!
//! [runtime]
//! flush_interval_ms = 500
//!
//! [default_cache]
//! backend = "sqlite"
//! location = "data/cache.db"
//!
//! [caches.twitch]
//! timeout = 60
//!
//! [[plugins]]
//! name = "maintenance"
//! priority = 10
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use murmur_core::CacheConfig;
use murmur_framework::plugin::PluginEntry;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Explicitly configured caches, by name.
    ///
    /// A plugin uses the cache with its own name; when absent one is built
    /// from [`default_cache`](Self::default_cache).
    #[serde(default)]
    pub caches: BTreeMap<String, CacheConfig>,

    #[serde(default)]
    pub default_cache: CacheConfig,

    /// Plugins to load, in order.
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, used when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    pub span_events: SpanEventConfig,
    /// Per-module levels, e.g. `murmur_core = "warn"`.
    pub filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// The configured level, or `None` if it is not a valid level name.
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        self.level.parse().ok()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Runtime
// =============================================================================

/// Timing of the runtime's housekeeping loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// How often plugin outboxes are flushed to the host, in milliseconds.
    pub flush_interval_ms: u64,
    /// How often expired cache entries are pruned, in seconds. `0` disables it.
    pub prune_interval_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1000,
            prune_interval_secs: 300,
        }
    }
}

impl RuntimeSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn prune_interval(&self) -> Option<Duration> {
        (self.prune_interval_secs > 0).then(|| Duration::from_secs(self.prune_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::CacheBackend;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = MurmurConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.tracing_level(), Some(tracing::Level::INFO));
        assert_eq!(config.runtime.flush_interval(), Duration::from_secs(1));
        assert_eq!(config.runtime.prune_interval(), Some(Duration::from_secs(300)));
        assert!(config.plugins.is_empty());
        assert_eq!(config.default_cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_partial_sections() {
        let config: MurmurConfig = serde_json::from_value(json!({
            "logging": { "format": "pretty", "filters": { "murmur_core": "warn" } },
            "runtime": { "prune_interval_secs": 0 },
            "caches": { "twitch": { "backend": "sqlite", "location": "twitch.db" } },
            "plugins": [{ "name": "maintenance", "priority": 3 }],
        }))
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters["murmur_core"], "warn");
        assert_eq!(config.runtime.flush_interval_ms, 1000);
        assert_eq!(config.runtime.prune_interval(), None);
        assert_eq!(config.caches["twitch"].backend, CacheBackend::Sqlite);
        assert_eq!(config.plugins[0].options.priority, 3);
    }
}
