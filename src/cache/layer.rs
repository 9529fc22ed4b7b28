//! Cache layer that orchestrates the resolution chain.
//!
//! A lookup walks [`RESOLUTION_CHAIN`] in order and stops at the first tier
//! that produces a value:
//!
//! 1. memory map (exact key)
//! 2. persistent store, if fresh and genuine (stale/synthesized values are
//!    remembered for tier 4)
//! 3. network, if online (written through to memory and store). A value the
//!    source itself synthesized is held back for tier 5.
//! 4. the remembered stale value
//! 5. a synthesized placeholder
//!
//! The tiers run strictly in sequence; there are never concurrent attempts
//! at two levels for one key.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Report, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::memory::MemoryMap;
use super::storage::CacheStorage;
use super::traits::{CacheResult, CacheSource, Cacheable, Lookup, Partition};

/// One level of the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  Memory,
  Store,
  Network,
  StaleStore,
  Placeholder,
}

/// The order in which tiers are consulted.
pub const RESOLUTION_CHAIN: [Tier; 5] = [
  Tier::Memory,
  Tier::Store,
  Tier::Network,
  Tier::StaleStore,
  Tier::Placeholder,
];

/// What the network tier got back from a fetcher.
#[derive(Debug)]
pub enum Fetched<T> {
  Found(T),
  /// The source answered that the key does not exist
  NotFound,
}

/// Where a lookup reads and writes.
pub struct Target<'a, T> {
  pub partition: Partition,
  pub key: &'a str,
  pub memory: &'a MemoryMap<T>,
  /// Whether a synthesized placeholder is written to the persistent store
  pub persist_placeholder: bool,
}

/// Cache layer that manages freshness, write-through and fallback policy.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before stored data is considered stale
  freshness: Duration,
  /// Allow a placeholder to replace a stored genuine record
  fallback_overwrites_real: bool,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      freshness: Duration::hours(24),
      fallback_overwrites_real: false,
    }
  }

  /// Set the freshness window for stored data.
  pub fn with_freshness(mut self, freshness: Duration) -> Self {
    self.freshness = freshness;
    self
  }

  pub fn with_fallback_overwrites_real(mut self, allow: bool) -> Self {
    self.fallback_overwrites_real = allow;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Check if a record written at `stored_at` (ms) is past the freshness window.
  pub fn is_stale(&self, stored_at: i64) -> bool {
    Utc::now().timestamp_millis() - stored_at > self.freshness.num_milliseconds()
  }

  /// Ask the persistent store for a key.
  pub fn lookup_store<T: Cacheable>(&self, partition: Partition, key: &str) -> Result<Lookup<T>> {
    match self.storage.get::<T>(partition, key)? {
      Some(record) if record.value.is_fallback() || self.is_stale(record.stored_at) => {
        Ok(Lookup::Stale(record.value))
      }
      Some(record) => Ok(Lookup::Hit(record.value)),
      None => Ok(Lookup::Miss),
    }
  }

  /// Store a value in both levels, stamped with the current time.
  pub fn write_through<T: Cacheable>(&self, target: &Target<'_, T>, value: &T) -> Result<()> {
    target.memory.insert(target.key, value.clone());
    self.storage.put(
      target.partition,
      target.key,
      value,
      Utc::now().timestamp_millis(),
    )
  }

  /// Persist a placeholder unless it would replace a genuine record.
  fn persist_placeholder<T: Cacheable>(
    &self,
    target: &Target<'_, T>,
    previous: Option<&T>,
    value: &T,
  ) -> Result<()> {
    if !target.persist_placeholder {
      return Ok(());
    }
    if previous.is_some_and(|p| !p.is_fallback()) && !self.fallback_overwrites_real {
      debug!(key = target.key, "keeping stored record instead of placeholder");
      return Ok(());
    }
    self.storage.put(
      target.partition,
      target.key,
      value,
      Utc::now().timestamp_millis(),
    )
  }

  /// Resolve one key through the full chain.
  ///
  /// A `NotFound` from the fetcher is terminal: it skips the stale tier and
  /// caches the placeholder as a negative result. A fetcher error with no
  /// stale value to fall back on is returned to the caller and nothing is
  /// persisted.
  pub async fn resolve<T, F, Fut, P>(
    &self,
    target: Target<'_, T>,
    online: bool,
    fetcher: F,
    placeholder: P,
  ) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Fetched<T>>>,
    P: FnOnce() -> T,
  {
    let mut fetcher = Some(fetcher);
    let mut placeholder = Some(placeholder);
    let mut remembered: Option<T> = None;
    let mut not_found = false;
    let mut failure: Option<Report> = None;
    let mut synthesized: Option<T> = None;

    for tier in RESOLUTION_CHAIN {
      match tier {
        Tier::Memory => {
          if let Some(value) = target.memory.get(target.key) {
            return Ok(CacheResult::new(value, CacheSource::Memory));
          }
        }
        Tier::Store => match self.lookup_store::<T>(target.partition, target.key)? {
          Lookup::Hit(value) => {
            target.memory.insert(target.key, value.clone());
            return Ok(CacheResult::new(value, CacheSource::Store));
          }
          Lookup::Stale(value) => remembered = Some(value),
          Lookup::Miss => {}
        },
        Tier::Network => {
          let Some(fetch) = fetcher.take().filter(|_| online) else {
            continue;
          };
          match fetch().await {
            // Synthesized upstream of us: no better than our own placeholder
            Ok(Fetched::Found(value)) if value.is_fallback() => {
              debug!(key = target.key, "source returned synthesized data");
              synthesized = Some(value);
            }
            Ok(Fetched::Found(value)) => {
              self.write_through(&target, &value)?;
              return Ok(CacheResult::new(value, CacheSource::Network));
            }
            Ok(Fetched::NotFound) => {
              debug!(key = target.key, "source reports not found");
              not_found = true;
            }
            Err(e) => {
              warn!(key = target.key, error = %e, "network fetch failed");
              failure = Some(e);
            }
          }
        }
        Tier::StaleStore => {
          if not_found {
            continue;
          }
          if let Some(value) = remembered.take() {
            return Ok(CacheResult::new(value, CacheSource::StaleStore));
          }
        }
        Tier::Placeholder => {
          if let Some(e) = failure.take() {
            return Err(e);
          }
          let value = match (synthesized.take(), placeholder.take()) {
            (Some(value), _) => value,
            (None, Some(make)) => make(),
            (None, None) => continue,
          };
          self.persist_placeholder(&target, remembered.as_ref(), &value)?;
          if not_found {
            target.memory.insert(target.key, value.clone());
          }
          return Ok(CacheResult::new(value, CacheSource::Fallback));
        }
      }
    }

    Err(eyre!("Resolution chain exhausted for {}", target.key))
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      freshness: self.freshness,
      fallback_overwrites_real: self.fallback_overwrites_real,
    }
  }
}
