//! Cache storage trait and its SQLite, in-memory and no-op implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheKey, CachedResponse};

/// Trait for cache storage backends.
///
/// A backend holds any number of named stores (one per cache generation),
/// each mapping cache keys to response snapshots.
pub trait CacheStorage: Send + Sync {
  /// Names of all existing stores, sorted.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Create the store if it does not exist yet.
  fn open_store(&self, store: &str) -> Result<()>;

  /// Look up an entry.
  fn get(&self, store: &str, key: &CacheKey) -> Result<Option<CachedResponse>>;

  /// Write an entry, creating the store if needed and replacing any previous entry.
  fn put(&self, store: &str, key: &CacheKey, response: &CachedResponse) -> Result<()>;

  /// Delete every store whose name matches `predicate`. Returns the deleted names.
  fn delete_stores<P>(&self, predicate: P) -> Result<Vec<String>>
  where
    P: Fn(&str) -> bool;

  /// Number of entries in a store (0 if it does not exist).
  fn entry_count(&self, store: &str) -> Result<usize>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn open_store(&self, _store: &str) -> Result<()> {
    Ok(())
  }

  fn get(&self, _store: &str, _key: &CacheKey) -> Result<Option<CachedResponse>> {
    Ok(None) // Always miss
  }

  fn put(&self, _store: &str, _key: &CacheKey, _response: &CachedResponse) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete_stores<P>(&self, _predicate: P) -> Result<Vec<String>>
  where
    P: Fn(&str) -> bool,
  {
    Ok(Vec::new())
  }

  fn entry_count(&self, _store: &str) -> Result<usize> {
    Ok(0)
  }
}

/// In-process storage. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
  stores: Mutex<BTreeMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, HashMap<String, CachedResponse>>>> {
    self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn store_names(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn open_store(&self, store: &str) -> Result<()> {
    self.lock()?.entry(store.to_string()).or_default();
    Ok(())
  }

  fn get(&self, store: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let stores = self.lock()?;
    Ok(
      stores
        .get(store)
        .and_then(|entries| entries.get(&key.hash()))
        .cloned(),
    )
  }

  fn put(&self, store: &str, key: &CacheKey, response: &CachedResponse) -> Result<()> {
    self
      .lock()?
      .entry(store.to_string())
      .or_default()
      .insert(key.hash(), response.clone());
    Ok(())
  }

  fn delete_stores<P>(&self, predicate: P) -> Result<Vec<String>>
  where
    P: Fn(&str) -> bool,
  {
    let mut stores = self.lock()?;
    let doomed: Vec<String> = stores
      .keys()
      .filter(|name| predicate(name))
      .cloned()
      .collect();
    for name in &doomed {
      stores.remove(name);
    }
    Ok(doomed)
  }

  fn entry_count(&self, store: &str) -> Result<usize> {
    Ok(self.lock()?.get(store).map_or(0, HashMap::len))
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    tracing::debug!(path = %path.display(), "Opened cache database");
    Ok(storage)
  }

  /// Open the cache database only if it already exists on disk.
  pub fn open_existing(path: Option<&Path>) -> Result<Option<Self>> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    if !path.exists() {
      return Ok(None);
    }
    Self::open(Some(&path)).map(Some)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("swcache").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per cache generation
CREATE TABLE IF NOT EXISTS cache_stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots, keyed by sha256("METHOD url")
CREATE TABLE IF NOT EXISTS cache_entries (
    store_name TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (store_name, key_hash),
    FOREIGN KEY (store_name) REFERENCES cache_stores(name) ON DELETE CASCADE
);
"#;

impl CacheStorage for SqliteStorage {
  fn store_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_stores ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache stores: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache store name: {}", e))?;

    Ok(names)
  }

  fn open_store(&self, store: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
        params![store],
      )
      .map_err(|e| eyre!("Failed to open cache store {}: {}", store, e))?;

    Ok(())
  }

  fn get(&self, store: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, cached_at FROM cache_entries
         WHERE store_name = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, String)> = stmt
      .query_row(params![store, key.hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry for {}: {}", key.url(), e))?;

    match row {
      Some((status, headers, body, cached_at)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;
        Ok(Some(CachedResponse {
          status,
          headers,
          body,
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, store: &str, key: &CacheKey, response: &CachedResponse) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_stores (name) VALUES (?)",
      params![store],
    )
    .map_err(|e| eyre!("Failed to open cache store {}: {}", store, e))?;

    tx.execute(
      "INSERT OR REPLACE INTO cache_entries
         (store_name, key_hash, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      params![
        store,
        key.hash(),
        key.method(),
        key.url(),
        response.status,
        headers,
        response.body,
        format_datetime(&response.cached_at),
      ],
    )
    .map_err(|e| eyre!("Failed to store cache entry for {}: {}", key.url(), e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn delete_stores<P>(&self, predicate: P) -> Result<Vec<String>>
  where
    P: Fn(&str) -> bool,
  {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let names = {
      let mut stmt = tx
        .prepare("SELECT name FROM cache_stores ORDER BY name")
        .map_err(|e| eyre!("Failed to prepare statement: {}", e))?;
      let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| eyre!("Failed to list cache stores: {}", e))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(|e| eyre!("Failed to read cache store name: {}", e))?;
      names
    };
    let doomed: Vec<String> = names.into_iter().filter(|name| predicate(name)).collect();

    // Entries go with their store (ON DELETE CASCADE)
    for name in &doomed {
      tx.execute("DELETE FROM cache_stores WHERE name = ?", params![name])
        .map_err(|e| eyre!("Failed to delete cache store {}: {}", name, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(doomed)
  }

  fn entry_count(&self, store: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?",
        params![store],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count as usize)
  }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn format_datetime(dt: &DateTime<Utc>) -> String {
  dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // "YYYY-MM-DD HH:MM:SS[.fff]"
  chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
