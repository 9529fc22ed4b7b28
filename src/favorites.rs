//! Durable set of favorite Pokémon ids.
//!
//! Favorites are user data and live next to the cache tables, but cache
//! clears never touch them.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;

use crate::cache::SqliteStorage;

#[derive(Clone)]
pub struct Favorites {
  storage: Arc<SqliteStorage>,
}

impl Favorites {
  pub fn new(storage: Arc<SqliteStorage>) -> Self {
    Self { storage }
  }

  /// Add the id if absent, remove it if present. Returns the new state.
  pub fn toggle(&self, id: u64) -> Result<bool> {
    if self.contains(id)? {
      self.remove(id)?;
      Ok(false)
    } else {
      self
        .storage
        .lock()?
        .execute(
          "INSERT OR IGNORE INTO favorites (pokemon_id, added_at) VALUES (?, ?)",
          params![id as i64, Utc::now().timestamp_millis()],
        )
        .map_err(|e| eyre!("Failed to add favorite {}: {}", id, e))?;
      Ok(true)
    }
  }

  pub fn remove(&self, id: u64) -> Result<()> {
    self
      .storage
      .lock()?
      .execute(
        "DELETE FROM favorites WHERE pokemon_id = ?",
        params![id as i64],
      )
      .map_err(|e| eyre!("Failed to remove favorite {}: {}", id, e))?;
    Ok(())
  }

  pub fn contains(&self, id: u64) -> Result<bool> {
    let count: i64 = self
      .storage
      .lock()?
      .query_row(
        "SELECT COUNT(*) FROM favorites WHERE pokemon_id = ?",
        params![id as i64],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to read favorites: {}", e))?;
    Ok(count > 0)
  }

  /// All favorite ids in the order they were added.
  pub fn ids(&self) -> Result<Vec<u64>> {
    let conn = self.storage.lock()?;
    let mut stmt = conn
      .prepare("SELECT pokemon_id FROM favorites ORDER BY position")
      .map_err(|e| eyre!("Failed to prepare favorites query: {}", e))?;

    let ids = stmt
      .query_map([], |row| row.get::<_, i64>(0))
      .map_err(|e| eyre!("Failed to read favorites: {}", e))?
      .collect::<rusqlite::Result<Vec<i64>>>()
      .map_err(|e| eyre!("Failed to read favorites: {}", e))?;

    Ok(ids.into_iter().map(|id| id as u64).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheStorage;

  fn favorites() -> Favorites {
    Favorites::new(Arc::new(SqliteStorage::open_in_memory().unwrap()))
  }

  #[test]
  fn test_toggle_adds_then_removes() {
    let favorites = favorites();
    assert!(favorites.toggle(25).unwrap());
    assert!(favorites.contains(25).unwrap());
    assert!(!favorites.toggle(25).unwrap());
    assert!(!favorites.contains(25).unwrap());
  }

  #[test]
  fn test_ids_keep_insertion_order() {
    let favorites = favorites();
    for id in [150, 1, 25] {
      favorites.toggle(id).unwrap();
    }
    assert_eq!(favorites.ids().unwrap(), vec![150, 1, 25]);
  }

  #[test]
  fn test_cache_clear_keeps_favorites() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let favorites = Favorites::new(Arc::clone(&storage));
    favorites.toggle(7).unwrap();

    storage.clear_all().unwrap();

    assert_eq!(favorites.ids().unwrap(), vec![7]);
  }
}
