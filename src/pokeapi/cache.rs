//! Caching implementations for Pokémon types.

use color_eyre::Result;

use crate::cache::{CacheLayer, CacheStorage, Cacheable, MemoryMap};

use super::types::{BasicPokemon, Pokemon, PokemonPage};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Pokemon {
  fn is_fallback(&self) -> bool {
    self.fallback
  }
}

impl Cacheable for Vec<Pokemon> {
  fn is_fallback(&self) -> bool {
    self.iter().any(|p| p.fallback)
  }
}

impl Cacheable for Vec<BasicPokemon> {}

impl Cacheable for PokemonPage {
  fn is_fallback(&self) -> bool {
    self.stale
  }
}

// ============================================================================
// Cache keys
// ============================================================================

/// Key of the full listing in the list partition
pub const FULL_LIST_KEY: &str = "fullList";

/// Normalize a name, id or query for cache lookups.
pub fn normalize_key(raw: &str) -> String {
  raw.trim().to_lowercase()
}

/// Key of one listing page in the list partition
pub fn page_key(limit: u32, offset: u32) -> String {
  format!("list-{}-{}", limit, offset)
}

// ============================================================================
// Cache manager
// ============================================================================

/// Owns every cache level the data access layer reads and writes.
///
/// Construct one per process (or per test) and share it; there is no global
/// cache state.
pub struct CacheManager<S: CacheStorage> {
  layer: CacheLayer<S>,
  pub(crate) pokemon: MemoryMap<Pokemon>,
  pub(crate) searches: MemoryMap<Vec<Pokemon>>,
  pub(crate) lists: MemoryMap<Vec<BasicPokemon>>,
}

impl<S: CacheStorage> CacheManager<S> {
  pub fn new(layer: CacheLayer<S>) -> Self {
    Self {
      layer,
      pokemon: MemoryMap::new(),
      searches: MemoryMap::new(),
      lists: MemoryMap::new(),
    }
  }

  pub fn layer(&self) -> &CacheLayer<S> {
    &self.layer
  }

  /// Empty every memory map, then every store partition.
  pub fn clear(&self) -> Result<()> {
    self.pokemon.clear();
    self.searches.clear();
    self.lists.clear();
    self.layer.storage().clear_all()
  }
}
