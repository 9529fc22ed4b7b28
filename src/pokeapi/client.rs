use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::api_types::{ApiPokemon, ApiPokemonList};
use super::error::FetchError;
use super::types::{Links, Pokemon, PokemonAbilities, PokemonPage};

/// Anything that can answer Pokémon lookups over the network.
#[async_trait]
pub trait PokemonSource: Send + Sync {
  /// Get one Pokémon by lowercase name or numeric id
  async fn get_pokemon(&self, key: &str) -> Result<Pokemon, FetchError>;

  /// Get one page of the listing. `fresh` asks intermediaries to skip their caches.
  async fn list_page(&self, limit: u32, offset: u32, fresh: bool)
    -> Result<PokemonPage, FetchError>;

  async fn get_abilities(&self, key: &str) -> Result<PokemonAbilities, FetchError> {
    self
      .get_pokemon(key)
      .await
      .map(|p| PokemonAbilities::from(&p))
  }

  /// Cheap reachability check. A page synthesized by an offline
  /// intermediary does not count.
  async fn ping(&self) -> Result<(), FetchError> {
    match self.list_page(1, 0, true).await? {
      page if page.stale => Err(FetchError::Status(503)),
      _ => Ok(()),
    }
  }
}

fn http_client() -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .connect_timeout(Duration::from_secs(10))
    .user_agent(concat!("pokedex/", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(|e| eyre!("Failed to create HTTP client: {}", e))
}

async fn get_json<T: DeserializeOwned>(
  http: &reqwest::Client,
  url: &str,
  fresh: bool,
) -> Result<T, FetchError> {
  debug!(url, fresh, "GET");

  let mut request = http.get(url);
  if fresh {
    request = request.header(header::CACHE_CONTROL, "no-cache");
  }

  let response = request.send().await?;
  match response.status() {
    StatusCode::NOT_FOUND => Err(FetchError::NotFound),
    status if !status.is_success() => Err(FetchError::Status(status.as_u16())),
    _ => Ok(response.json::<T>().await?),
  }
}

/// Client for the public Pokémon API. Reshapes its nested records.
#[derive(Clone)]
pub struct UpstreamClient {
  http: reqwest::Client,
  base_url: String,
  links: Links,
}

impl UpstreamClient {
  /// `links.api_base` is used for the `url` field of reshaped records.
  pub fn new(base_url: &str, links: Links) -> Result<Self> {
    Ok(Self {
      http: http_client()?,
      base_url: base_url.trim_end_matches('/').to_string(),
      links,
    })
  }
}

#[async_trait]
impl PokemonSource for UpstreamClient {
  async fn get_pokemon(&self, key: &str) -> Result<Pokemon, FetchError> {
    let url = format!("{}/{}", self.base_url, key.to_lowercase());
    let api: ApiPokemon = get_json(&self.http, &url, false).await?;
    Ok(api.into_pokemon(&self.links))
  }

  async fn list_page(
    &self,
    limit: u32,
    offset: u32,
    fresh: bool,
  ) -> Result<PokemonPage, FetchError> {
    let url = format!("{}?limit={}&offset={}", self.base_url, limit, offset);
    let api: ApiPokemonList = get_json(&self.http, &url, fresh).await?;
    Ok(api.into_page(offset, &self.links))
  }
}

/// Client for the forwarding layer, whose bodies are already flat.
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: String,
}

impl BackendClient {
  pub fn new(base_url: &str) -> Result<Self> {
    Ok(Self {
      http: http_client()?,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }
}

#[async_trait]
impl PokemonSource for BackendClient {
  async fn get_pokemon(&self, key: &str) -> Result<Pokemon, FetchError> {
    let url = format!("{}/{}", self.base_url, key);
    get_json(&self.http, &url, false).await
  }

  async fn list_page(
    &self,
    limit: u32,
    offset: u32,
    fresh: bool,
  ) -> Result<PokemonPage, FetchError> {
    let url = format!("{}?limit={}&offset={}", self.base_url, limit, offset);
    get_json(&self.http, &url, fresh).await
  }

  async fn get_abilities(&self, key: &str) -> Result<PokemonAbilities, FetchError> {
    let url = format!("{}/{}/abilities", self.base_url, key);
    get_json(&self.http, &url, false).await
  }
}
