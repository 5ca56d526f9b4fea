//! TTL key-value cache with interchangeable backends.
//!
//! # Backends
//!
//! | Type | Storage | Concurrency |
//! |------|---------|-------------|
//! | [`MemoryCache`] | in-process map | one mutex per instance |
//! | [`SqliteCache`] | single-table SQLite file | fresh connection per operation |
//!
//! Both implement the object-safe [`Cache`] trait over raw bytes. Typed access
//! goes through [`CacheExt`], which serializes values with `serde_json`.
//!
//! # Expiry
//!
//! Every entry stores an absolute `expires` timestamp:
//!
//! - `0.0` never expires.
//! - `> 0.0` expires once `expires <= now`.
//!
//! On write the timeout is resolved as *explicit argument, else instance
//! default*. A resolved timeout of `0` stores `0.0`; anything else stores
//! `now + timeout`, so a negative timeout writes an already-expired entry.
//!
//! # Example
//!
//! ```rust
//! use murmur_core::cache::{Cache, CacheExt, CacheKey, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("answer", &42, None)?;
//! assert_eq!(cache.get::<i32>("answer")?, Some(42));
//!
//! // A call-time prefix overrides the instance prefix.
//! cache.set(CacheKey::new("answer").with_prefix("other"), &7, Some(0.0))?;
//! assert_eq!(cache.get::<i32>(CacheKey::new("answer").with_prefix("other"))?, Some(7));
//! # Ok::<(), murmur_core::CacheError>(())
//! ```

mod manager;
mod memory;
mod sqlite;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use manager::{CacheBackend, CacheConfig, CacheManager};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::error::{CacheError, CacheResult};

/// Default timeout, in seconds, for caches built without one.
pub const DEFAULT_TIMEOUT: f64 = 600.0;

// ─── CacheKey ────────────────────────────────────────────────────────────────

/// A cache key with an optional call-time prefix.
///
/// The stored key is `"{prefix}_{key}"` when a prefix applies. A call-time
/// prefix wins over the cache's construction-time prefix; an empty prefix
/// counts as none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    key: &'a str,
    prefix: Option<&'a str>,
}

impl<'a> CacheKey<'a> {
    pub const fn new(key: &'a str) -> Self {
        Self { key, prefix: None }
    }

    /// Sets a call-time prefix.
    pub const fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// The stored key, given the cache's own prefix.
    pub fn resolve(&self, default_prefix: Option<&str>) -> String {
        match self.prefix.filter(|p| !p.is_empty()).or(default_prefix) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{}", self.key),
            _ => self.key.to_string(),
        }
    }
}

impl<'a> From<&'a str> for CacheKey<'a> {
    fn from(key: &'a str) -> Self {
        Self::new(key)
    }
}

impl<'a> From<&'a String> for CacheKey<'a> {
    fn from(key: &'a String) -> Self {
        Self::new(key)
    }
}

// ─── Cache trait ─────────────────────────────────────────────────────────────

/// Object-safe cache backend over serialized bytes.
///
/// `set_bytes` and `add_bytes` prune expired entries before writing.
pub trait Cache: Send + Sync {
    /// Stored bytes for a live entry.
    fn get_bytes(&self, key: CacheKey<'_>) -> CacheResult<Option<Vec<u8>>>;

    /// Writes or replaces an entry.
    fn set_bytes(&self, key: CacheKey<'_>, value: Vec<u8>, timeout: Option<f64>)
    -> CacheResult<()>;

    /// Writes only if the key is physically absent. Returns whether it wrote.
    fn add_bytes(
        &self,
        key: CacheKey<'_>,
        value: Vec<u8>,
        timeout: Option<f64>,
    ) -> CacheResult<bool>;

    /// Removes the key if present.
    fn delete_key(&self, key: CacheKey<'_>) -> CacheResult<()>;

    /// Whether a live entry exists for the key.
    fn contains_key(&self, key: CacheKey<'_>) -> CacheResult<bool>;

    /// Removes every entry.
    fn clear(&self) -> CacheResult<()>;

    /// Removes expired entries. Returns how many were removed.
    fn prune(&self) -> CacheResult<usize>;

    /// Number of live entries.
    fn len(&self) -> CacheResult<usize>;

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Stored keys of live entries, sorted.
    fn keys(&self) -> CacheResult<Vec<String>>;

    /// Timeout applied when a write passes `None`.
    fn default_timeout(&self) -> f64;

    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;
}

// ─── Typed access ────────────────────────────────────────────────────────────

/// Typed operations for every [`Cache`], including `dyn Cache`.
pub trait CacheExt: Cache {
    /// Deserialized value of a live entry.
    ///
    /// A value that fails to deserialize as `T` reads as absent.
    fn get<'k, T: DeserializeOwned>(&self, key: impl Into<CacheKey<'k>>) -> CacheResult<Option<T>> {
        let key = key.into();
        let Some(bytes) = self.get_bytes(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(
                    backend = self.backend(),
                    key = %key.key,
                    error = %e,
                    "Cached value failed to deserialize, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Serializes and stores `value`, replacing any entry.
    fn set<'k, T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey<'k>>,
        value: &T,
        timeout: Option<f64>,
    ) -> CacheResult<()> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Serialize)?;
        self.set_bytes(key.into(), bytes, timeout)
    }

    /// Stores `value` only if the key is absent. Returns whether it wrote.
    fn add<'k, T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey<'k>>,
        value: &T,
        timeout: Option<f64>,
    ) -> CacheResult<bool> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Serialize)?;
        self.add_bytes(key.into(), bytes, timeout)
    }

    fn delete<'k>(&self, key: impl Into<CacheKey<'k>>) -> CacheResult<()> {
        self.delete_key(key.into())
    }

    fn contains<'k>(&self, key: impl Into<CacheKey<'k>>) -> CacheResult<bool> {
        self.contains_key(key.into())
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// The computed value is stored with the default timeout. `compute` runs
    /// at most once per call; concurrent misses on the same key may each
    /// compute, and the last write wins.
    fn get_or_compute<'k, T, F>(&self, key: impl Into<CacheKey<'k>>, compute: F) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let key = key.into();
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = compute();
        self.set(key, &value, None)?;
        Ok(value)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Wraps a one-argument computation so its result is cached under `key`.
///
/// The argument does not take part in the key: the first call computes and
/// every later call within the timeout returns the stored value.
///
/// ```rust
/// use std::sync::Arc;
/// use murmur_core::cache::{Cache, MemoryCache, memoize};
///
/// let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
/// let lookup = memoize(cache, "streams", |n: u32| n * 2);
/// assert_eq!(lookup(2)?, 4);
/// assert_eq!(lookup(10)?, 4);
/// # Ok::<(), murmur_core::CacheError>(())
/// ```
pub fn memoize<A, T, F>(
    cache: Arc<dyn Cache>,
    key: impl Into<String>,
    compute: F,
) -> impl Fn(A) -> CacheResult<T>
where
    T: Serialize + DeserializeOwned,
    F: Fn(A) -> T,
{
    let key = key.into();
    move |arg| cache.get_or_compute(key.as_str(), || compute(arg))
}

// ─── Expiry helpers ──────────────────────────────────────────────────────────

/// Absolute expiry for a write at `now`.
pub(crate) fn expires_at(timeout: Option<f64>, default_timeout: f64, now: f64) -> f64 {
    let ttl = timeout.unwrap_or(default_timeout);
    if ttl == 0.0 { 0.0 } else { now + ttl }
}

pub(crate) fn is_expired(expires: f64, now: f64) -> bool {
    expires > 0.0 && expires <= now
}
