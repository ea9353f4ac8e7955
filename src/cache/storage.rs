//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::StoredSlot;

/// Trait for cache storage backends.
///
/// Slots are written whole: a reader either sees the previous snapshot or the
/// new one, never a mix.
pub trait CacheStorage: Send + Sync {
  /// Replace the contents of a slot.
  fn store_slot(
    &self,
    key: &str,
    description: &str,
    snapshot_type: &str,
    data: &[u8],
  ) -> Result<()>;

  /// Read a slot, if it was ever written.
  fn load_slot(&self, key: &str) -> Result<Option<StoredSlot>>;

  /// Drop a slot.
  fn clear_slot(&self, key: &str) -> Result<()>;
}

impl<T: CacheStorage + ?Sized> CacheStorage for Box<T> {
  fn store_slot(
    &self,
    key: &str,
    description: &str,
    snapshot_type: &str,
    data: &[u8],
  ) -> Result<()> {
    (**self).store_slot(key, description, snapshot_type, data)
  }

  fn load_slot(&self, key: &str) -> Result<Option<StoredSlot>> {
    (**self).load_slot(key)
  }

  fn clear_slot(&self, key: &str) -> Result<()> {
    (**self).clear_slot(key)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_slot(&self, _key: &str, _description: &str, _type: &str, _data: &[u8]) -> Result<()> {
    Ok(()) // Discard
  }

  fn load_slot(&self, _key: &str) -> Result<Option<StoredSlot>> {
    Ok(None) // Always miss
  }

  fn clear_slot(&self, _key: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Create a new SQLite storage at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Create a storage that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("memosync").join("cache.db"))
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
-- One row per named slot, each holding a whole serialized snapshot
CREATE TABLE IF NOT EXISTS snapshot_cache (
    slot_key TEXT PRIMARY KEY,
    slot_description TEXT NOT NULL,
    snapshot_type TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn store_slot(
    &self,
    key: &str,
    description: &str,
    snapshot_type: &str,
    data: &[u8],
  ) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshot_cache (slot_key, slot_description, snapshot_type, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key, description, snapshot_type, data],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }

  fn load_slot(&self, key: &str) -> Result<Option<StoredSlot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT snapshot_type, data, cached_at FROM snapshot_cache WHERE slot_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))?;

    match row {
      Some((snapshot_type, data, cached_at_str)) => Ok(Some(StoredSlot {
        snapshot_type,
        data,
        cached_at: parse_datetime(&cached_at_str)?,
      })),
      None => Ok(None),
    }
  }

  fn clear_slot(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM snapshot_cache WHERE slot_key = ?", params![key])
      .map_err(|e| eyre!("Failed to clear snapshot: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
