use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Cache, DEFAULT_TIMEOUT, MemoryCache, SqliteCache};
use crate::error::{CacheError, CacheResult};

/// Which backend a [`CacheConfig`] builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Declarative description of one cache.
///
/// ```toml
/// [caches.twitch]
/// backend = "sqlite"
/// location = "data/cache.db"
/// timeout = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Database file for the sqlite backend.
    pub location: Option<PathBuf>,
    /// Default timeout in seconds. `0` means never expire.
    pub timeout: f64,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            location: None,
            timeout: DEFAULT_TIMEOUT,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn sqlite(location: impl Into<PathBuf>) -> Self {
        Self {
            backend: CacheBackend::Sqlite,
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Builds the cache this config describes.
    pub fn build(&self) -> CacheResult<Arc<dyn Cache>> {
        match self.backend {
            CacheBackend::Memory => {
                let mut cache = MemoryCache::new().with_timeout(self.timeout);
                if let Some(prefix) = &self.key_prefix {
                    cache = cache.with_key_prefix(prefix.clone());
                }
                Ok(Arc::new(cache))
            }
            CacheBackend::Sqlite => {
                let location = self.location.clone().ok_or_else(|| {
                    CacheError::invalid_location("", "sqlite backend requires a location")
                })?;
                let mut cache = SqliteCache::open(location)?.with_timeout(self.timeout);
                if let Some(prefix) = &self.key_prefix {
                    cache = cache.with_key_prefix(prefix.clone());
                }
                Ok(Arc::new(cache))
            }
        }
    }
}

// =============================================================================
// CacheManager
// =============================================================================

/// Named registry of shared caches.
///
/// One manager is created at startup and handed to everything that needs a
/// cache. Each plugin gets the cache named after it via
/// [`get_cache`](Self::get_cache), which creates one from the manager's
/// defaults on first use.
///
/// When the defaults point at a sqlite file, implicitly created caches share
/// that file and are kept apart by using the cache name as key prefix.
pub struct CacheManager {
    caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
    defaults: CacheConfig,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Creates a manager whose implicit caches are in-memory.
    pub fn new() -> Self {
        Self::with_defaults(CacheConfig::default())
    }

    /// Creates a manager whose implicit caches follow `defaults`.
    pub fn with_defaults(defaults: CacheConfig) -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Returns the cache named `name`, creating it from the defaults.
    pub fn get_cache(&self, name: &str) -> CacheResult<Arc<dyn Cache>> {
        if let Some(cache) = self.caches.read().get(name) {
            return Ok(Arc::clone(cache));
        }

        let mut caches = self.caches.write();
        if let Some(cache) = caches.get(name) {
            return Ok(Arc::clone(cache));
        }

        let mut config = self.defaults.clone();
        if config.backend == CacheBackend::Sqlite && config.key_prefix.is_none() {
            config.key_prefix = Some(name.to_string());
        }
        let cache = config.build()?;
        debug!(cache = %name, backend = cache.backend(), "Created cache");
        caches.insert(name.to_string(), Arc::clone(&cache));
        Ok(cache)
    }

    /// Registers a prebuilt cache, returning the one it replaced.
    pub fn add_cache(&self, name: impl Into<String>, cache: Arc<dyn Cache>) -> Option<Arc<dyn Cache>> {
        self.caches.write().insert(name.into(), cache)
    }

    /// Removes a cache from the registry. Handles already given out stay valid.
    pub fn delete_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        self.caches.write().remove(name)
    }

    /// Builds every configured cache and registers it under its name.
    ///
    /// All caches are built before any is registered, so a failure leaves the
    /// manager unchanged.
    pub fn configure(&self, configs: &BTreeMap<String, CacheConfig>) -> CacheResult<()> {
        let built = configs
            .iter()
            .map(|(name, config)| Ok((name.clone(), config.build()?)))
            .collect::<CacheResult<Vec<_>>>()?;

        let mut caches = self.caches.write();
        for (name, cache) in built {
            info!(cache = %name, backend = cache.backend(), "Configured cache");
            caches.insert(name, cache);
        }
        Ok(())
    }

    /// Names of all registered caches, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Prunes every registered cache, logging failures. Returns entries removed.
    pub fn prune_all(&self) -> usize {
        let caches: Vec<(String, Arc<dyn Cache>)> = self
            .caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), Arc::clone(cache)))
            .collect();

        caches
            .into_iter()
            .map(|(name, cache)| match cache.prune() {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to prune cache");
                    0
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::cache::CacheExt;

    #[test]
    fn test_get_cache_is_setdefault() {
        let manager = CacheManager::new();
        let a = manager.get_cache("plugin").unwrap();
        a.set("k", &1, None).unwrap();
        let b = manager.get_cache("plugin").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.get::<i32>("k").unwrap(), Some(1));
        assert_eq!(a.default_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_add_and_delete_cache() {
        let manager = CacheManager::new();
        let custom: Arc<dyn Cache> = Arc::new(MemoryCache::new().with_timeout(5.0));
        assert!(manager.add_cache("custom", Arc::clone(&custom)).is_none());
        assert_eq!(manager.get_cache("custom").unwrap().default_timeout(), 5.0);

        assert!(manager.delete_cache("custom").is_some());
        assert_eq!(
            manager.get_cache("custom").unwrap().default_timeout(),
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn test_configure() {
        let dir = TempDir::new().unwrap();
        let mut configs = BTreeMap::new();
        configs.insert("fast".to_string(), CacheConfig::memory().with_timeout(1.0));
        configs.insert(
            "disk".to_string(),
            CacheConfig::sqlite(dir.path().join("cache.db")).with_timeout(0.0),
        );

        let manager = CacheManager::new();
        manager.configure(&configs).unwrap();
        assert_eq!(manager.names(), vec!["disk", "fast"]);
        assert_eq!(manager.get_cache("disk").unwrap().backend(), "sqlite");
        assert_eq!(manager.get_cache("fast").unwrap().default_timeout(), 1.0);
    }

    #[test]
    fn test_configure_failure_registers_nothing() {
        let mut configs = BTreeMap::new();
        configs.insert("ok".to_string(), CacheConfig::memory());
        configs.insert(
            "broken".to_string(),
            CacheConfig {
                backend: CacheBackend::Sqlite,
                location: None,
                ..CacheConfig::default()
            },
        );

        let manager = CacheManager::new();
        assert!(manager.configure(&configs).is_err());
        assert!(manager.names().is_empty());
    }

    #[test]
    fn test_sqlite_defaults_prefix_by_name() {
        let dir = TempDir::new().unwrap();
        let manager = CacheManager::with_defaults(CacheConfig::sqlite(dir.path().join("c.db")));
        let a = manager.get_cache("alpha").unwrap();
        let b = manager.get_cache("beta").unwrap();
        a.set("k", &"a", None).unwrap();
        b.set("k", &"b", None).unwrap();
        assert_eq!(a.get::<String>("k").unwrap().as_deref(), Some("a"));
        assert_eq!(b.get::<String>("k").unwrap().as_deref(), Some("b"));
        assert_eq!(a.keys().unwrap(), vec!["alpha_k", "beta_k"]);
    }

    #[test]
    fn test_prune_all() {
        let manager = CacheManager::new();
        let cache = manager.get_cache("p").unwrap();
        cache.set("a", &1, Some(0.0)).unwrap();
        cache.set_bytes("b".into(), b"1".to_vec(), Some(-1.0)).unwrap();
        assert_eq!(manager.prune_all(), 1);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_config_deserialize() {
        let config: CacheConfig =
            serde_json::from_value(serde_json::json!({ "backend": "sqlite", "location": "x.db" }))
                .unwrap();
        assert_eq!(config.backend, CacheBackend::Sqlite);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
