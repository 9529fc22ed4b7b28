//! Named response caches persisted in SQLite.
//!
//! Mirrors the browser cache storage model: a set of named caches, each a
//! map from request URL to a stored response. URLs are keyed by their
//! SHA-256 so keys stay fixed-length whatever the query string.

use axum::{
  body::Body,
  http::{header, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A response as kept in a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl CachedResponse {
  pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      content_type: content_type.map(String::from),
      body: body.into(),
    }
  }

  pub fn json(value: &serde_json::Value) -> Self {
    Self::new(200, Some("application/json"), value.to_string())
  }
}

impl IntoResponse for CachedResponse {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Body::from(self.body)).into_response();
    if let Some(value) = self
      .content_type
      .as_deref()
      .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
      response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
  }
}

/// Stable fixed-length key for a request URL
pub fn url_key(url: &str) -> String {
  hex::encode(Sha256::digest(url.as_bytes()))
}

pub struct ResponseStore {
  conn: Mutex<Connection>,
}

impl ResponseStore {
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create edge cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open edge cache at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory edge cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(EDGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run edge cache migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pokedex").join("edge.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Create a cache if it does not exist yet.
  pub fn open_cache(&self, name: &str) -> Result<()> {
    self
      .lock()?
      .execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?, ?)",
        params![name, Utc::now().timestamp_millis()],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;
    Ok(())
  }

  /// Store a response under `url`, replacing any previous one.
  pub fn put(&self, cache: &str, url: &str, response: &CachedResponse) -> Result<()> {
    self.open_cache(cache)?;
    self
      .lock()?
      .execute(
        "INSERT OR REPLACE INTO responses
           (cache_name, url_key, url, status, content_type, body, stored_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          cache,
          url_key(url),
          url,
          response.status,
          response.content_type,
          response.body,
          Utc::now().timestamp_millis()
        ],
      )
      .map_err(|e| eyre!("Failed to store {} in {}: {}", url, cache, e))?;
    Ok(())
  }

  /// Look up `url` in one cache.
  pub fn match_in(&self, cache: &str, url: &str) -> Result<Option<CachedResponse>> {
    self
      .lock()?
      .query_row(
        "SELECT status, content_type, body FROM responses WHERE cache_name = ? AND url_key = ?",
        params![cache, url_key(url)],
        |row| {
          Ok(CachedResponse {
            status: row.get(0)?,
            content_type: row.get(1)?,
            body: row.get(2)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {} from {}: {}", url, cache, e))
  }

  /// Look up `url` in every cache, oldest cache first.
  pub fn match_url(&self, url: &str) -> Result<Option<CachedResponse>> {
    self
      .lock()?
      .query_row(
        "SELECT r.status, r.content_type, r.body
         FROM responses r JOIN caches c ON c.name = r.cache_name
         WHERE r.url_key = ?
         ORDER BY c.created_at, c.name
         LIMIT 1",
        params![url_key(url)],
        |row| {
          Ok(CachedResponse {
            status: row.get(0)?,
            content_type: row.get(1)?,
            body: row.get(2)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", url, e))
  }

  pub fn cache_names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM caches ORDER BY created_at, name")
      .map_err(|e| eyre!("Failed to prepare cache listing: {}", e))?;
    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to list caches: {}", e))?;
    Ok(names)
  }

  /// Drop a cache and everything in it. Returns whether it existed.
  pub fn delete_cache(&self, name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to start transaction: {}", e))?;
    tx.execute("DELETE FROM responses WHERE cache_name = ?", params![name])
      .map_err(|e| eyre!("Failed to empty cache {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM caches WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit cache deletion: {}", e))?;
    Ok(removed > 0)
  }

  /// Every URL stored in a cache.
  pub fn urls(&self, cache: &str) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT url FROM responses WHERE cache_name = ? ORDER BY url")
      .map_err(|e| eyre!("Failed to prepare url listing: {}", e))?;
    let urls = stmt
      .query_map(params![cache], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list urls in {}: {}", cache, e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to list urls in {}: {}", cache, e))?;
    Ok(urls)
  }

  pub fn count(&self, cache: &str) -> Result<usize> {
    let count: i64 = self
      .lock()?
      .query_row(
        "SELECT COUNT(*) FROM responses WHERE cache_name = ?",
        params![cache],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count {}: {}", cache, e))?;
    Ok(count as usize)
  }
}

const EDGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS responses (
    cache_name TEXT NOT NULL,
    url_key TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (cache_name, url_key)
);
"#;
