//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML files (`murmur.toml`, `config.toml`)
//! - `yaml-config`: enables YAML files (`murmur.yaml`, `murmur.yml`, `config.yaml`, `config.yml`)
//!
//! Both features can be enabled together; each format is then searched.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`murmur.{profile}.toml`)
//! 3. Main config file (`murmur.toml` / `config.toml`)
//! 4. Environment variables (`MURMUR_*`)
//! 5. Programmatic merges
//!
//! # Environment Variable Mapping
//!
//! Variables use the `MURMUR_` prefix with `__` as the nesting separator:
//!
//! - `MURMUR_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `MURMUR_RUNTIME__FLUSH_INTERVAL_MS=250` → `runtime.flush_interval_ms = 250`
//! - `MURMUR_DEFAULT_CACHE__TIMEOUT=60` → `default_cache.timeout = 60`
//!
//! # Example
//!
//! ```rust,ignore
//! use murmur_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/murmur.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::providers::{Env, Serialized};
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::{Figment, Provider};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::MurmurConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "MURMUR_";
const PROFILE_VAR: &str = "MURMUR_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `MURMUR_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Multi-source configuration loader.
pub struct ConfigLoader {
    /// Programmatic sources, merged last.
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for config files.
    ///
    /// Without any, the current directory and the user config directory
    /// (`~/.config/murmur` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("murmur")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration programmatically.
    pub fn merge(mut self, config: MurmurConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Merges any figment provider, e.g. `Toml::string(..)` or
    /// `Serialized::default("runtime.flush_interval_ms", 250)`.
    pub fn merge_provider<P: Provider>(mut self, provider: P) -> Self {
        self.figment = self.figment.merge(provider);
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<MurmurConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: MurmurConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            plugins = config.plugins.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load_validated(self) -> ConfigResult<MurmurConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(MurmurConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let user_figment = std::mem::take(&mut self.figment);
        Ok(figment.merge(user_figment))
    }

    /// Merges a single file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("murmur"));
        }
        paths
    }

    /// Searches `search_paths × base_names` for one format.
    ///
    /// The profile variant (`murmur.production.toml`) is merged before its
    /// base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["murmur.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["murmur.yaml", "murmur.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads and validates the configuration from the default locations.
pub fn load_config() -> ConfigResult<MurmurConfig> {
    ConfigLoader::new().load_validated()
}

/// Loads and validates the configuration from `path`, with env overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<MurmurConfig> {
    ConfigLoader::new().file(path).load_validated()
}

// =============================================================================
// Tests
// =============================================================================
