use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, trace};

use super::{Cache, CacheKey, DEFAULT_TIMEOUT, expires_at, is_expired};
use crate::clock;
use crate::error::{CacheError, CacheResult};

const CREATE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS container (key TEXT PRIMARY KEY, value BLOB, expires FLOAT)";
const GET_SQL: &str = "SELECT value, expires FROM container WHERE key = ?1";
const SET_SQL: &str = "INSERT OR REPLACE INTO container (key, value, expires) VALUES (?1, ?2, ?3)";
const ADD_SQL: &str = "INSERT OR IGNORE INTO container (key, value, expires) VALUES (?1, ?2, ?3)";
const DELETE_SQL: &str = "DELETE FROM container WHERE key = ?1";
const CLEAR_SQL: &str = "DELETE FROM container";
const PRUNE_SQL: &str = "DELETE FROM container WHERE expires <= ?1 AND expires > 0";
const CONTAINS_SQL: &str =
    "SELECT 1 FROM container WHERE key = ?1 AND (expires = 0 OR expires > ?2)";
const COUNT_SQL: &str = "SELECT COUNT(*) FROM container WHERE expires = 0 OR expires > ?1";
const KEYS_SQL: &str = "SELECT key FROM container WHERE expires = 0 OR expires > ?1 ORDER BY key";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File-backed cache stored in a single SQLite table.
///
/// ```text
/// container(key TEXT PRIMARY KEY, value BLOB, expires FLOAT)
/// ```
///
/// Every operation opens its own connection and closes it on return, so a
/// handle can be shared freely between threads. Several handles may point at
/// the same file; give them distinct key prefixes to keep their keys apart.
/// [`clear`](Cache::clear) empties the whole table regardless of prefix.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    location: PathBuf,
    default_timeout: f64,
    key_prefix: Option<String>,
}

impl SqliteCache {
    /// Opens (creating if needed) the cache file at `location`.
    ///
    /// In-memory databases are rejected: with a connection per operation
    /// they would lose every write.
    pub fn open(location: impl Into<PathBuf>) -> CacheResult<Self> {
        let location = location.into();
        let in_memory = {
            let path = location.to_string_lossy();
            path.is_empty() || path == ":memory:" || path.starts_with("file::memory:")
        };
        if in_memory {
            return Err(CacheError::invalid_location(
                location,
                "persistent cache requires a file path",
            ));
        }

        if let Some(parent) = location.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let cache = Self {
            location,
            default_timeout: DEFAULT_TIMEOUT,
            key_prefix: None,
        };
        cache.connect()?;
        debug!(location = %cache.location.display(), "Opened persistent cache");
        Ok(cache)
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

    /// Path of the database file.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Scoped connection: created per operation, dropped on return.
    fn connect(&self) -> CacheResult<Connection> {
        let conn = Connection::open(&self.location)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute(CREATE_SQL, [])?;
        Ok(conn)
    }

    fn resolve(&self, key: CacheKey<'_>) -> String {
        key.resolve(self.key_prefix.as_deref())
    }

    fn prune_with(conn: &Connection, now: f64) -> CacheResult<usize> {
        Ok(conn.execute(PRUNE_SQL, params![now])?)
    }
}

impl Cache for SqliteCache {
    fn get_bytes(&self, key: CacheKey<'_>) -> CacheResult<Option<Vec<u8>>> {
        let key = self.resolve(key);
        let conn = self.connect()?;
        let row: Option<(Vec<u8>, f64)> = conn
            .query_row(GET_SQL, params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        let now = clock::now();
        Ok(row
            .filter(|(_, expires)| !is_expired(*expires, now))
            .map(|(value, _)| value))
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
        let conn = self.connect()?;
        Self::prune_with(&conn, now)?;
        conn.execute(SET_SQL, params![key, value, expires])?;
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
        let conn = self.connect()?;
        Self::prune_with(&conn, now)?;
        let inserted = conn.execute(ADD_SQL, params![key, value, expires])?;
        Ok(inserted == 1)
    }

    fn delete_key(&self, key: CacheKey<'_>) -> CacheResult<()> {
        let key = self.resolve(key);
        self.connect()?.execute(DELETE_SQL, params![key])?;
        Ok(())
    }

    fn contains_key(&self, key: CacheKey<'_>) -> CacheResult<bool> {
        let key = self.resolve(key);
        let conn = self.connect()?;
        let found = conn
            .query_row(CONTAINS_SQL, params![key, clock::now()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn clear(&self) -> CacheResult<()> {
        self.connect()?.execute(CLEAR_SQL, [])?;
        Ok(())
    }

    fn prune(&self) -> CacheResult<usize> {
        let removed = Self::prune_with(&self.connect()?, clock::now())?;
        if removed > 0 {
            trace!(backend = "sqlite", removed, "Pruned expired cache entries");
        }
        Ok(removed)
    }

    fn len(&self) -> CacheResult<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(COUNT_SQL, params![clock::now()], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(KEYS_SQL)?;
        let keys = stmt
            .query_map(params![clock::now()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn default_timeout(&self) -> f64 {
        self.default_timeout
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::cache::CacheExt;

    fn open(dir: &TempDir) -> SqliteCache {
        SqliteCache::open(dir.path().join("cache.db")).unwrap()
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Stream {
        name: String,
        viewers: u32,
    }

    #[test]
    fn test_set_get_add() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        cache.set("herp", &"derp", None).unwrap();
        assert_eq!(cache.get::<String>("herp").unwrap().as_deref(), Some("derp"));

        assert!(cache.add("k", &1, None).unwrap());
        assert!(!cache.add("k", &2, None).unwrap());
        assert_eq!(cache.get::<i32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_object_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let stream = Stream {
            name: "speedrun".into(),
            viewers: 1200,
        };
        cache.set("stream", &stream, None).unwrap();
        assert_eq!(cache.get::<Stream>("stream").unwrap(), Some(stream));
    }

    #[test]
    fn test_delete_clear_len() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        cache.set("a", &1, None).unwrap();
        cache.set("b", &2, None).unwrap();
        assert_eq!(cache.len().unwrap(), 2);

        cache.delete("a").unwrap();
        assert!(!cache.contains("a").unwrap());
        assert!(cache.contains("b").unwrap());

        cache.clear().unwrap();
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_timeouts() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir).with_timeout(0.05);
        cache.set("gone", &1, Some(-1.0)).unwrap();
        cache.set("forever", &1, Some(0.0)).unwrap();
        cache.set("short", &1, None).unwrap();

        assert_eq!(cache.get::<i32>("gone").unwrap(), None);
        assert_eq!(cache.len().unwrap(), 2);

        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get::<i32>("short").unwrap(), None);
        assert_eq!(cache.get::<i32>("forever").unwrap(), Some(1));
        assert_eq!(cache.prune().unwrap(), 1);
        assert_eq!(cache.keys().unwrap(), vec!["forever"]);
    }

    #[test]
    fn test_persists_across_handles() {
        let dir = TempDir::new().unwrap();
        open(&dir).set("k", &"v", Some(0.0)).unwrap();
        assert_eq!(open(&dir).get::<String>("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_key_prefix_isolation() {
        let dir = TempDir::new().unwrap();
        let plain = open(&dir);
        let plain_again = open(&dir);
        let prefixed = open(&dir).with_key_prefix("test");

        plain.set("kk", &"plain", None).unwrap();
        prefixed.set("kk", &"prefixed", None).unwrap();

        assert_eq!(plain.get::<String>("kk").unwrap().as_deref(), Some("plain"));
        assert_eq!(plain_again.get::<String>("kk").unwrap().as_deref(), Some("plain"));
        assert_eq!(prefixed.get::<String>("kk").unwrap().as_deref(), Some("prefixed"));

        plain.clear().unwrap();
        prefixed
            .add(CacheKey::new("kk").with_prefix("prefix"), &"v", None)
            .unwrap();
        prefixed.add(CacheKey::new("kk").with_prefix("p"), &"v", None).unwrap();
        prefixed.add("kk", &"v", None).unwrap();
        assert_eq!(plain.len().unwrap(), 3);
        assert!(!plain.contains("kk").unwrap());
        assert!(plain.contains("test_kk").unwrap());
    }

    #[test]
    fn test_rejects_memory_location() {
        assert!(matches!(
            SqliteCache::open(":memory:"),
            Err(CacheError::InvalidLocation { .. })
        ));
        assert!(SqliteCache::open("").is_err());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(dir.path().join("nested/deeper/cache.db")).unwrap();
        cache.set("k", &1, None).unwrap();
        assert!(cache.location().exists());
    }
}
