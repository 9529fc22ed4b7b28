//! In-process Pokémon source for tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::client::PokemonSource;
use super::error::FetchError;
use super::types::{BasicPokemon, Pokemon, PokemonPage, PokemonStat};

/// Build a realistic record with stats derived from the id.
pub fn pokemon(id: u64, name: &str) -> Pokemon {
  let hp = match name {
    "bulbasaur" => 45,
    "charmander" => 39,
    "pikachu" => 35,
    _ => 50,
  };
  Pokemon {
    id,
    name: name.to_string(),
    url: format!("http://localhost:3000/api/pokemon/{}", id),
    height: 7,
    weight: 69,
    types: vec!["normal".to_string()],
    sprite: format!("https://sprites.test/{}.png", id),
    abilities: vec![format!("{}-ability", name)],
    stats: vec![
      PokemonStat {
        name: "hp".into(),
        base: hp,
      },
      PokemonStat {
        name: "attack".into(),
        base: 50 + (id % 40) as u32,
      },
    ],
    last_updated: 0,
    fallback: false,
  }
}

/// Source backed by a fixed catalog, with switches for failure modes.
pub struct FakeSource {
  catalog: BTreeMap<u64, Pokemon>,
  calls: AtomicUsize,
  fresh_page_calls: AtomicUsize,
  failing: AtomicBool,
  stale_pages: AtomicBool,
  synthesized_pages: AtomicBool,
  failing_keys: Mutex<HashSet<String>>,
}

impl FakeSource {
  pub fn with_catalog() -> Self {
    let catalog = [
      (1, "bulbasaur"),
      (4, "charmander"),
      (5, "charmeleon"),
      (6, "charizard"),
      (25, "pikachu"),
      (1000, "pikachar"),
    ]
    .into_iter()
    .map(|(id, name)| (id, pokemon(id, name)))
    .collect();

    Self {
      catalog,
      calls: AtomicUsize::new(0),
      fresh_page_calls: AtomicUsize::new(0),
      failing: AtomicBool::new(false),
      stale_pages: AtomicBool::new(false),
      synthesized_pages: AtomicBool::new(false),
      failing_keys: Mutex::new(HashSet::new()),
    }
  }

  /// Number of entity lookups served or refused
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn fresh_page_calls(&self) -> usize {
    self.fresh_page_calls.load(Ordering::SeqCst)
  }

  /// Make every request fail with a transport error.
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Answer non-fresh page requests with a page marked stale.
  pub fn set_stale_pages(&self, stale: bool) {
    self.stale_pages.store(stale, Ordering::SeqCst);
  }

  /// Answer every page request, fresh or not, with an empty stale page,
  /// the way an offline edge does.
  pub fn set_synthesized_pages(&self, synthesized: bool) {
    self.synthesized_pages.store(synthesized, Ordering::SeqCst);
  }

  /// Make lookups of one key fail with a server error.
  pub fn fail_key(&self, key: &str) {
    if let Ok(mut keys) = self.failing_keys.lock() {
      keys.insert(key.to_string());
    }
  }

  fn check_failing(&self) -> Result<(), FetchError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(FetchError::Transport("connection refused".into()));
    }
    Ok(())
  }
}

#[async_trait]
impl PokemonSource for FakeSource {
  async fn get_pokemon(&self, key: &str) -> Result<Pokemon, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;

    let failing_key = self
      .failing_keys
      .lock()
      .map(|keys| keys.contains(key))
      .unwrap_or(false);
    if failing_key {
      return Err(FetchError::Status(503));
    }

    self
      .catalog
      .values()
      .find(|p| p.name == key || p.id.to_string() == key)
      .cloned()
      .ok_or(FetchError::NotFound)
  }

  async fn list_page(
    &self,
    limit: u32,
    offset: u32,
    fresh: bool,
  ) -> Result<PokemonPage, FetchError> {
    self.check_failing()?;
    if fresh {
      self.fresh_page_calls.fetch_add(1, Ordering::SeqCst);
    }

    let stale = self.synthesized_pages.load(Ordering::SeqCst)
      || (!fresh && self.stale_pages.load(Ordering::SeqCst));
    let pokemon = if stale {
      Vec::new()
    } else {
      self
        .catalog
        .values()
        .skip(offset as usize)
        .take(limit as usize)
        .map(|p| BasicPokemon {
          id: p.id,
          name: p.name.clone(),
          url: p.url.clone(),
          sprite: p.sprite.clone(),
        })
        .collect()
    };

    Ok(PokemonPage {
      count: self.catalog.len() as u64,
      pokemon,
      stale,
    })
  }
}
