//! Data access layer: resolves Pokémon, pages and searches through the cache.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheResult, CacheSource, CacheStorage, Fetched, Lookup, Partition, Target};
use crate::connectivity::Connectivity;
use crate::favorites::Favorites;

use super::cache::{normalize_key, page_key, CacheManager, FULL_LIST_KEY};
use super::client::PokemonSource;
use super::error::FetchError;
use super::types::{BasicPokemon, Comparison, Links, Pokemon, PokemonAbilities, PokemonPage};

/// Pokémon access with transparent caching and offline support.
pub struct PokemonService<S: CacheStorage> {
  source: Arc<dyn PokemonSource>,
  cache: Arc<CacheManager<S>>,
  connectivity: Connectivity,
  links: Links,
  full_list_limit: u32,
}

impl<S: CacheStorage> Clone for PokemonService<S> {
  fn clone(&self) -> Self {
    Self {
      source: Arc::clone(&self.source),
      cache: Arc::clone(&self.cache),
      connectivity: self.connectivity.clone(),
      links: self.links.clone(),
      full_list_limit: self.full_list_limit,
    }
  }
}

impl<S: CacheStorage> PokemonService<S> {
  pub fn new(
    source: Arc<dyn PokemonSource>,
    cache: Arc<CacheManager<S>>,
    connectivity: Connectivity,
    links: Links,
  ) -> Self {
    Self {
      source,
      cache,
      connectivity,
      links,
      full_list_limit: 1000,
    }
  }

  /// Set how many entries the full listing used by search fetches.
  pub fn with_full_list_limit(mut self, limit: u32) -> Self {
    self.full_list_limit = limit;
    self
  }

  pub fn connectivity(&self) -> &Connectivity {
    &self.connectivity
  }

  /// Resolve one Pokémon by name or id.
  pub async fn get_pokemon(&self, id_or_name: &str) -> Result<CacheResult<Pokemon>> {
    let key = normalize_key(id_or_name);
    if key.is_empty() {
      return Err(eyre!("Empty Pokémon identifier"));
    }

    let target = Target {
      partition: Partition::Pokemon,
      key: &key,
      memory: &self.cache.pokemon,
      persist_placeholder: true,
    };

    let result = self
      .cache
      .layer()
      .resolve(
        target,
        self.connectivity.is_online(),
        || async {
          match self.source.get_pokemon(&key).await {
            Ok(mut pokemon) => {
              pokemon.last_updated = Utc::now().timestamp_millis();
              Ok(Fetched::Found(pokemon))
            }
            Err(FetchError::NotFound) => Ok(Fetched::NotFound),
            Err(e) => Err(eyre!("Failed to fetch Pokémon {}: {}", key, e)),
          }
        },
        || {
          let mut placeholder = Pokemon::placeholder(&key, &self.links);
          placeholder.last_updated = Utc::now().timestamp_millis();
          placeholder
        },
      )
      .await?;

    debug!(key = %key, source = result.source.label(), "resolved pokemon");
    Ok(result)
  }

  /// Resolve many keys concurrently, dropping the ones that fail.
  pub async fn resolve_many(&self, keys: &[String]) -> Vec<Pokemon> {
    let results = join_all(keys.iter().map(|key| self.get_pokemon(key))).await;

    keys
      .iter()
      .zip(results)
      .filter_map(|(key, result)| match result {
        Ok(resolved) => Some(resolved.data),
        Err(e) => {
          warn!(key = %key, error = %e, "dropping pokemon from batch");
          None
        }
      })
      .collect()
  }

  /// Get one listing page.
  ///
  /// A page the edge marked stale is re-fetched with caches bypassed when
  /// online. A failed fetch, or one still stale after the re-fetch, falls
  /// back to the cached copy of the same page.
  pub async fn fetch_list(&self, limit: u32, offset: u32) -> Result<CacheResult<PokemonPage>> {
    let key = page_key(limit, offset);
    let storage = self.cache.layer().storage();

    if !self.connectivity.is_online() {
      return match storage.get::<PokemonPage>(Partition::PokemonList, &key)? {
        Some(record) => Ok(CacheResult::new(record.value, CacheSource::StaleStore)),
        None => Err(eyre!("Offline and no cached page {}", key)),
      };
    }

    let mut fetched = self.source.list_page(limit, offset, false).await;
    if matches!(&fetched, Ok(page) if page.stale) {
      debug!(key = %key, "page marked stale, forcing refetch");
      fetched = self.source.list_page(limit, offset, true).await;
    }

    match fetched {
      Ok(page) if !page.stale => {
        storage.put(
          Partition::PokemonList,
          &key,
          &page,
          Utc::now().timestamp_millis(),
        )?;
        Ok(CacheResult::new(page, CacheSource::Network))
      }
      Ok(page) => {
        warn!(key = %key, "page still stale after refetch");
        match storage.get::<PokemonPage>(Partition::PokemonList, &key)? {
          Some(record) => Ok(CacheResult::new(record.value, CacheSource::StaleStore)),
          None => Ok(CacheResult::new(page, CacheSource::Fallback)),
        }
      }
      Err(e) => {
        warn!(key = %key, error = %e, "page fetch failed");
        match storage.get::<PokemonPage>(Partition::PokemonList, &key)? {
          Some(record) => Ok(CacheResult::new(record.value, CacheSource::StaleStore)),
          None => Err(eyre!("Failed to load page {}: {}", key, e)),
        }
      }
    }
  }

  /// The full listing of basic references, used as the search corpus.
  ///
  /// Never fails: with nothing cached and no network this is empty.
  pub async fn full_list(&self) -> Vec<BasicPokemon> {
    let target = Target {
      partition: Partition::PokemonList,
      key: FULL_LIST_KEY,
      memory: &self.cache.lists,
      persist_placeholder: false,
    };

    let result = self
      .cache
      .layer()
      .resolve(
        target,
        self.connectivity.is_online(),
        || async {
          match self.source.list_page(self.full_list_limit, 0, false).await {
            Ok(page) if !page.stale => Ok(Fetched::Found(page.pokemon)),
            Ok(_) => Err(eyre!("Full listing came back stale")),
            Err(e) => Err(eyre!("Failed to load full listing: {}", e)),
          }
        },
        Vec::new,
      )
      .await;

    match result {
      Ok(list) => list.data,
      Err(e) => {
        warn!(error = %e, "full listing unavailable");
        Vec::new()
      }
    }
  }

  /// Search by name substring, or by id substring when the query is numeric.
  pub async fn search(&self, query: &str) -> Result<Vec<Pokemon>> {
    let key = normalize_key(query);
    if key.is_empty() {
      return Ok(Vec::new());
    }

    if let Some(hit) = self.cache.searches.get(&key) {
      return Ok(hit);
    }

    if let Lookup::Hit(hit) = self
      .cache
      .layer()
      .lookup_store::<Vec<Pokemon>>(Partition::Search, &key)?
    {
      self.cache.searches.insert(&key, hit.clone());
      return Ok(hit);
    }

    let listing = self.full_list().await;
    let names: Vec<String> = filter_candidates(&listing, &key)
      .into_iter()
      .map(|p| p.name.clone())
      .collect();

    let mut results = self.resolve_many(&names).await;
    sort_by_match(&mut results, &key);

    if results.iter().any(|p| p.fallback) {
      debug!(query = %key, "search contains placeholders, not caching");
    } else {
      self.cache.searches.insert(&key, results.clone());
      self.cache.layer().storage().put(
        Partition::Search,
        &key,
        &results,
        Utc::now().timestamp_millis(),
      )?;
    }

    Ok(results)
  }

  /// Resolve two Pokémon concurrently and diff their stats.
  pub async fn compare(&self, first: &str, second: &str) -> Result<Comparison> {
    let (a, b) = futures::try_join!(self.get_pokemon(first), self.get_pokemon(second))?;
    Ok(Comparison::between(a.data, b.data))
  }

  pub async fn get_abilities(&self, id_or_name: &str) -> Result<PokemonAbilities> {
    let resolved = self.get_pokemon(id_or_name).await?;
    Ok(PokemonAbilities::from(&resolved.data))
  }

  /// Resolve every favorite in the order it was added.
  pub async fn favorites(&self, favorites: &Favorites) -> Result<Vec<Pokemon>> {
    let keys: Vec<String> = favorites.ids()?.iter().map(u64::to_string).collect();
    Ok(self.resolve_many(&keys).await)
  }

  /// Drop every cached record, in memory and on disk.
  pub fn clear_cache(&self) -> Result<()> {
    self.cache.clear()?;
    debug!("cache cleared");
    Ok(())
  }
}

/// Pick listing entries that match a normalized query.
fn filter_candidates<'a>(listing: &'a [BasicPokemon], query: &str) -> Vec<&'a BasicPokemon> {
  let numeric = query.parse::<u64>().is_ok();
  listing
    .iter()
    .filter(|p| {
      if numeric {
        p.id.to_string().contains(query)
      } else {
        p.name.to_lowercase().contains(query)
      }
    })
    .collect()
}

/// Earlier matches first, then by name. Names without the query go last.
fn sort_by_match(results: &mut [Pokemon], query: &str) {
  let position = |p: &Pokemon| p.name.to_lowercase().find(query).unwrap_or(usize::MAX);
  results.sort_by(|a, b| {
    position(a)
      .cmp(&position(b))
      .then_with(|| a.name.cmp(&b.name))
  });
}
