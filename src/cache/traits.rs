//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for records that can be cached.
///
/// Freshness is judged from the store's write timestamp; implementors only
/// report whether the value is genuine or a synthesized placeholder.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Whether this record was synthesized rather than fetched.
  fn is_fallback(&self) -> bool {
    false
  }
}

/// Named partitions of the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
  /// Entity records keyed by normalized name or id
  Pokemon,
  /// Listing pages and the full listing
  PokemonList,
  /// Search results keyed by normalized query
  Search,
}

impl Partition {
  pub const ALL: [Partition; 3] = [Partition::Pokemon, Partition::PokemonList, Partition::Search];

  pub fn name(self) -> &'static str {
    match self {
      Partition::Pokemon => "pokemon",
      Partition::PokemonList => "pokemon_list",
      Partition::Search => "search",
    }
  }
}

/// Outcome of asking one cache level for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
  /// Usable value, stop here
  Hit(T),
  /// Value exists but is too old or synthesized; remember it for later
  Stale(T),
  /// Nothing stored
  Miss,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn new(data: T, source: CacheSource) -> Self {
    Self { data, source }
  }
}

/// Indicates where resolved data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Process-lifetime memory map
  Memory,
  /// Persistent store, within the freshness window
  Store,
  /// Fresh data from network
  Network,
  /// Persistent store, stale or synthesized, served because the network was not usable
  StaleStore,
  /// Placeholder synthesized on the spot
  Fallback,
}

impl CacheSource {
  pub fn label(self) -> &'static str {
    match self {
      CacheSource::Memory => "memory",
      CacheSource::Store => "store",
      CacheSource::Network => "network",
      CacheSource::StaleStore => "stale cache",
      CacheSource::Fallback => "fallback",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partition_names_are_distinct() {
    let names: std::collections::HashSet<_> = Partition::ALL.iter().map(|p| p.name()).collect();
    assert_eq!(names.len(), Partition::ALL.len());
  }

  #[test]
  fn test_source_labels() {
    assert_eq!(CacheSource::StaleStore.label(), "stale cache");
    assert_eq!(CacheSource::Fallback.label(), "fallback");
  }
}
