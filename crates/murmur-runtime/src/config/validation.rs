//! Configuration validation.

use std::collections::HashSet;

use murmur_core::{CacheBackend, CacheConfig};
use murmur_framework::plugin::PluginEntry;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, MurmurConfig, RuntimeSettings};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &MurmurConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    validate_runtime(&config.runtime)?;
    validate_cache("default_cache", &config.default_cache)?;
    for (name, cache) in &config.caches {
        validate_cache(&format!("caches.{name}"), cache)?;
    }
    validate_plugins(&config.plugins)?;
    Ok(())
}

fn validate_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_level(&logging.level)?;
    for level in logging.filters.values() {
        validate_level(level)?;
    }
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_runtime(runtime: &RuntimeSettings) -> ConfigResult<()> {
    if runtime.flush_interval_ms == 0 {
        return Err(ConfigError::validation(
            "runtime.flush_interval_ms must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_cache(field: &str, cache: &CacheConfig) -> ConfigResult<()> {
    if cache.backend == CacheBackend::Sqlite
        && cache.location.as_ref().is_none_or(|l| l.as_os_str().is_empty())
    {
        return Err(ConfigError::missing_field(format!("{field}.location")));
    }
    if !cache.timeout.is_finite() {
        return Err(ConfigError::validation(format!(
            "{field}.timeout must be a finite number of seconds"
        )));
    }
    Ok(())
}

fn validate_plugins(plugins: &[PluginEntry]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for entry in plugins {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::missing_field("plugins.name"));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::DuplicatePlugin(entry.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&MurmurConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_log_levels() {
        let mut config = MurmurConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());

        config.logging.level = "loud".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.logging.level = "info".to_string();
        config.logging.filters.insert("murmur_core".into(), "chatty".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = MurmurConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "logging.file_path"
        ));
    }

    #[test]
    fn test_validate_flush_interval() {
        let mut config = MurmurConfig::default();
        config.runtime.flush_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_caches() {
        let mut config = MurmurConfig::default();
        config.caches.insert(
            "twitch".into(),
            CacheConfig {
                backend: CacheBackend::Sqlite,
                location: None,
                ..CacheConfig::default()
            },
        );
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "caches.twitch.location"
        ));

        let mut config = MurmurConfig::default();
        config.default_cache = CacheConfig::memory().with_timeout(f64::INFINITY);
        assert!(validate_config(&config).is_err());

        let mut config = MurmurConfig::default();
        config.default_cache = CacheConfig::sqlite("cache.db").with_timeout(0.0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_plugins() {
        let mut config = MurmurConfig::default();
        config.plugins = vec![PluginEntry::new("a"), PluginEntry::new("b")];
        assert!(validate_config(&config).is_ok());

        config.plugins.push(PluginEntry::new("a"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicatePlugin(ref name)) if name == "a"
        ));

        config.plugins = vec![PluginEntry::new(" ")];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
