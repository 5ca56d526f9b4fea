use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;

use parking_lot::Mutex;
use tracing::trace;

use super::{Cache, CacheKey, DEFAULT_TIMEOUT, expires_at, is_expired};
use crate::clock;
use crate::error::CacheResult;

struct Entry {
    value: Vec<u8>,
    expires: f64,
}

/// In-process cache guarded by a single mutex.
///
/// Shared between the event thread and plugin timer tasks; every operation
/// takes the lock once.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    default_timeout: f64,
    key_prefix: Option<String>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an empty cache with the 600 second default timeout.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_timeout: DEFAULT_TIMEOUT,
            key_prefix: None,
        }
    }

    /// Sets the default timeout in seconds. `0` means entries never expire.
    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Prefixes every key written through this handle.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn resolve(&self, key: CacheKey<'_>) -> String {
        key.resolve(self.key_prefix.as_deref())
    }
}

fn prune_locked(entries: &mut HashMap<String, Entry>, now: f64) -> usize {
    let before = entries.len();
    entries.retain(|_, e| !is_expired(e.expires, now));
    before - entries.len()
}

impl Cache for MemoryCache {
    fn get_bytes(&self, key: CacheKey<'_>) -> CacheResult<Option<Vec<u8>>> {
        let key = self.resolve(key);
        let now = clock::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(&key)
            .filter(|e| !is_expired(e.expires, now))
            .map(|e| e.value.clone()))
    }

    fn set_bytes(
        &self,
        key: CacheKey<'_>,
        value: Vec<u8>,
        timeout: Option<f64>,
    ) -> CacheResult<()> {
        let key = self.resolve(key);
        let now = clock::now();
        let expires = expires_at(timeout, self.default_timeout, now);
        let mut entries = self.entries.lock();
        prune_locked(&mut entries, now);
        entries.insert(key, Entry { value, expires });
        Ok(())
    }

    fn add_bytes(
        &self,
        key: CacheKey<'_>,
        value: Vec<u8>,
        timeout: Option<f64>,
    ) -> CacheResult<bool> {
        let key = self.resolve(key);
        let now = clock::now();
        let expires = expires_at(timeout, self.default_timeout, now);
        let mut entries = self.entries.lock();
        prune_locked(&mut entries, now);
        match entries.entry(key) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry { value, expires });
                Ok(true)
            }
        }
    }

    fn delete_key(&self, key: CacheKey<'_>) -> CacheResult<()> {
        let key = self.resolve(key);
        self.entries.lock().remove(&key);
        Ok(())
    }

    fn contains_key(&self, key: CacheKey<'_>) -> CacheResult<bool> {
        let key = self.resolve(key);
        let now = clock::now();
        Ok(self
            .entries
            .lock()
            .get(&key)
            .is_some_and(|e| !is_expired(e.expires, now)))
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn prune(&self) -> CacheResult<usize> {
        let removed = prune_locked(&mut self.entries.lock(), clock::now());
        if removed > 0 {
            trace!(backend = "memory", removed, "Pruned expired cache entries");
        }
        Ok(removed)
    }

    fn len(&self) -> CacheResult<usize> {
        let now = clock::now();
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|e| !is_expired(e.expires, now))
            .count())
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let now = clock::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, e)| !is_expired(e.expires, now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn default_timeout(&self) -> f64 {
        self.default_timeout
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::cache::CacheExt;

    #[test]
    fn test_set_get() {
        let cache = MemoryCache::new();
        cache.set("herp", &"derp", None).unwrap();
        assert_eq!(cache.get::<String>("herp").unwrap().as_deref(), Some("derp"));
        assert_eq!(cache.get::<String>("missing").unwrap(), None);
    }

    #[test]
    fn test_add_is_setdefault() {
        let cache = MemoryCache::new();
        assert!(cache.add("k", &1, None).unwrap());
        assert!(!cache.add("k", &2, None).unwrap());
        assert_eq!(cache.get::<i32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1, None).unwrap();
        cache.set("b", &2, None).unwrap();
        cache.delete("a").unwrap();
        cache.delete("never-set").unwrap();
        assert_eq!(cache.get::<i32>("a").unwrap(), None);
        assert_eq!(cache.len().unwrap(), 1);

        cache.clear().unwrap();
        assert_eq!(cache.len().unwrap(), 0);
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_negative_timeout_is_expired() {
        let cache = MemoryCache::new();
        cache.set("k", &"v", Some(-1.0)).unwrap();
        assert_eq!(cache.get::<String>("k").unwrap(), None);
        assert!(!cache.contains("k").unwrap());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_zero_timeout_never_expires() {
        let cache = MemoryCache::new().with_timeout(0.0);
        cache.set("k", &"v", Some(0.0)).unwrap();
        cache.set("d", &"v", None).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(cache.contains("k").unwrap());
        assert!(cache.contains("d").unwrap());
    }

    #[test]
    fn test_expiration() {
        let cache = MemoryCache::new().with_timeout(0.05);
        cache.set("k", &"v", None).unwrap();
        assert!(cache.contains("k").unwrap());
        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get::<String>("k").unwrap(), None);
        assert_eq!(cache.prune().unwrap(), 1);
    }

    #[test]
    fn test_add_does_not_overwrite_unpruned_entry() {
        let cache = MemoryCache::new();
        cache.set("live", &1, Some(0.0)).unwrap();
        assert!(!cache.add("live", &2, Some(0.0)).unwrap());

        // add prunes first, so an expired entry no longer blocks it
        cache.set("stale", &1, Some(-1.0)).unwrap();
        assert!(cache.add("stale", &2, None).unwrap());
        assert_eq!(cache.get::<i32>("stale").unwrap(), Some(2));
    }

    #[test]
    fn test_keys_and_prefix() {
        let cache = MemoryCache::new().with_key_prefix("plugin");
        cache.set("b", &1, None).unwrap();
        cache.set("a", &1, None).unwrap();
        cache
            .set(CacheKey::new("a").with_prefix("other"), &1, None)
            .unwrap();
        assert_eq!(
            cache.keys().unwrap(),
            vec!["other_a", "plugin_a", "plugin_b"]
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..25 {
                        cache.set(format!("{i}-{j}").as_str(), &j, None).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len().unwrap(), 100);
    }
}
