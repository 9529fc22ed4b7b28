//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::Partition;

/// A single stored record with its write timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord<T> {
  pub value: T,
  /// Milliseconds since the epoch
  pub stored_at: i64,
}

/// Trait for persistent cache backends organized into partitions.
pub trait CacheStorage: Send + Sync {
  /// Get a record by key from a partition.
  fn get<T: DeserializeOwned>(&self, partition: Partition, key: &str)
    -> Result<Option<StoredRecord<T>>>;

  /// Store (or overwrite) a record.
  fn put<T: Serialize>(&self, partition: Partition, key: &str, value: &T, stored_at: i64)
    -> Result<()>;

  /// Remove every record in a partition.
  fn clear(&self, partition: Partition) -> Result<()>;

  /// Number of records in a partition.
  fn count(&self, partition: Partition) -> Result<usize>;

  /// Empty every partition in order. The first failure aborts the rest.
  fn clear_all(&self) -> Result<()> {
    for partition in Partition::ALL {
      self.clear(partition)?;
    }
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store at `path`, or at the default location when `None`.
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

    Self::with_connection(conn)
  }

  /// Open a private in-memory store. Each call gets a fresh database.
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

    Ok(data_dir.join("pokedex").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Partitioned record cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS records (
    partition TEXT NOT NULL,
    record_key TEXT NOT NULL,
    data BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (partition, record_key)
);

-- Favorite ids, in the order they were added
CREATE TABLE IF NOT EXISTS favorites (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    pokemon_id INTEGER NOT NULL UNIQUE,
    added_at INTEGER NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get<T: DeserializeOwned>(
    &self,
    partition: Partition,
    key: &str,
  ) -> Result<Option<StoredRecord<T>>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT data, stored_at FROM records WHERE partition = ? AND record_key = ?",
        params![partition.name(), key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {} record {}: {}", partition.name(), key, e))?;

    match row {
      Some((data, stored_at)) => {
        let value: T = serde_json::from_slice(&data).map_err(|e| {
          eyre!(
            "Failed to deserialize {} record {}: {}",
            partition.name(),
            key,
            e
          )
        })?;
        Ok(Some(StoredRecord { value, stored_at }))
      }
      None => Ok(None),
    }
  }

  fn put<T: Serialize>(
    &self,
    partition: Partition,
    key: &str,
    value: &T,
    stored_at: i64,
  ) -> Result<()> {
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize record: {}", e))?;

    self
      .lock()?
      .execute(
        "INSERT OR REPLACE INTO records (partition, record_key, data, stored_at)
         VALUES (?, ?, ?, ?)",
        params![partition.name(), key, data, stored_at],
      )
      .map_err(|e| eyre!("Failed to store {} record {}: {}", partition.name(), key, e))?;

    Ok(())
  }

  fn clear(&self, partition: Partition) -> Result<()> {
    self
      .lock()?
      .execute(
        "DELETE FROM records WHERE partition = ?",
        params![partition.name()],
      )
      .map_err(|e| eyre!("Failed to clear {} partition: {}", partition.name(), e))?;
    Ok(())
  }

  fn count(&self, partition: Partition) -> Result<usize> {
    let count: i64 = self
      .lock()?
      .query_row(
        "SELECT COUNT(*) FROM records WHERE partition = ?",
        params![partition.name()],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count {} partition: {}", partition.name(), e))?;
    Ok(count as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Delegates to SQLite but refuses to clear one partition.
  struct BrokenPartition {
    inner: SqliteStorage,
    broken: Partition,
  }

  impl CacheStorage for BrokenPartition {
    fn get<T: DeserializeOwned>(
      &self,
      partition: Partition,
      key: &str,
    ) -> Result<Option<StoredRecord<T>>> {
      self.inner.get(partition, key)
    }

    fn put<T: Serialize>(
      &self,
      partition: Partition,
      key: &str,
      value: &T,
      stored_at: i64,
    ) -> Result<()> {
      self.inner.put(partition, key, value, stored_at)
    }

    fn clear(&self, partition: Partition) -> Result<()> {
      if partition == self.broken {
        return Err(eyre!("disk I/O error"));
      }
      self.inner.clear(partition)
    }

    fn count(&self, partition: Partition) -> Result<usize> {
      self.inner.count(partition)
    }
  }

  #[test]
  fn test_clear_all_stops_at_first_failure() {
    let storage = BrokenPartition {
      inner: SqliteStorage::open_in_memory().unwrap(),
      broken: Partition::PokemonList,
    };
    for partition in Partition::ALL {
      storage.put(partition, "key", &1, 0).unwrap();
    }

    assert!(storage.clear_all().is_err());

    assert_eq!(storage.count(Partition::Pokemon).unwrap(), 0);
    assert_eq!(storage.count(Partition::PokemonList).unwrap(), 1);
    assert_eq!(storage.count(Partition::Search).unwrap(), 1);
  }

  #[test]
  fn test_put_then_get() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put(Partition::Pokemon, "pikachu", &vec!["electric"], 42)
      .unwrap();

    let record: StoredRecord<Vec<String>> =
      storage.get(Partition::Pokemon, "pikachu").unwrap().unwrap();
    assert_eq!(record.value, vec!["electric".to_string()]);
    assert_eq!(record.stored_at, 42);
  }

  #[test]
  fn test_missing_key_is_none() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let record: Option<StoredRecord<String>> = storage.get(Partition::Search, "nothing").unwrap();
    assert!(record.is_none());
  }

  #[test]
  fn test_partitions_are_isolated() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(Partition::Pokemon, "char", &1, 1).unwrap();
    storage.put(Partition::Search, "char", &2, 1).unwrap();

    let entity: StoredRecord<i32> = storage.get(Partition::Pokemon, "char").unwrap().unwrap();
    let search: StoredRecord<i32> = storage.get(Partition::Search, "char").unwrap().unwrap();
    assert_eq!(entity.value, 1);
    assert_eq!(search.value, 2);
  }

  #[test]
  fn test_put_overwrites_last_writer_wins() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(Partition::Pokemon, "eevee", &"old", 1).unwrap();
    storage.put(Partition::Pokemon, "eevee", &"new", 2).unwrap();

    let record: StoredRecord<String> = storage.get(Partition::Pokemon, "eevee").unwrap().unwrap();
    assert_eq!(record.value, "new");
    assert_eq!(storage.count(Partition::Pokemon).unwrap(), 1);
  }

  #[test]
  fn test_clear_all_empties_every_partition() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    for partition in Partition::ALL {
      storage.put(partition, "key", &0, 0).unwrap();
    }

    storage.clear_all().unwrap();

    for partition in Partition::ALL {
      assert_eq!(storage.count(partition).unwrap(), 0);
    }
  }

  #[test]
  fn test_corrupt_payload_is_an_error() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(Partition::Pokemon, "bad", &"not a number", 0).unwrap();

    let result: Result<Option<StoredRecord<u32>>> = storage.get(Partition::Pokemon, "bad");
    assert!(result.is_err());
  }

  #[test]
  fn test_open_creates_parent_directory() {
    let dir = std::env::temp_dir().join(format!("pokedex-storage-{}", std::process::id()));
    let path = dir.join("nested").join("cache.db");
    let storage = SqliteStorage::open(Some(&path)).unwrap();
    storage.put(Partition::PokemonList, "fullList", &0, 0).unwrap();
    assert!(path.exists());
    let _ = std::fs::remove_dir_all(dir);
  }
}
