//! Forwarding API: reshapes upstream records into flat JSON.
//!
//! Every handler is a straight pass-through to a [`PokemonSource`]; there is
//! no caching on this side.

mod error;

pub use error::ApiError;

use axum::{
  extract::{Path, Query, State},
  response::Json,
  routing::get,
  Router,
};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::pokeapi::{normalize_key, PokemonAbilities, PokemonPage, PokemonSource};

const WELCOME: &str = "Welcome to the Pokémon API";

#[derive(Clone)]
pub struct AppState {
  pub source: Arc<dyn PokemonSource>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default = "default_limit")]
  limit: u32,
  #[serde(default)]
  offset: u32,
}

fn default_limit() -> u32 {
  10
}

/// Build the forwarding router.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(welcome))
    .route("/api/pokemon", get(list_pokemon))
    .route("/api/pokemon/{name}", get(get_pokemon))
    .route("/api/pokemon/{name}/abilities", get(get_abilities))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

/// Serve until the process is stopped.
pub async fn run(addr: SocketAddr, state: AppState) -> Result<()> {
  let listener = TcpListener::bind(addr)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", addr, e))?;
  info!("Pokémon API listening on http://{}", addr);

  axum::serve(listener, router(state))
    .await
    .map_err(|e| eyre!("Server error: {}", e))
}

async fn welcome() -> &'static str {
  WELCOME
}

async fn list_pokemon(
  State(state): State<AppState>,
  Query(params): Query<ListParams>,
) -> Result<Json<PokemonPage>, ApiError> {
  state
    .source
    .list_page(params.limit, params.offset, false)
    .await
    .map(Json)
    .map_err(|e| {
      warn!(limit = params.limit, offset = params.offset, error = %e, "list failed");
      ApiError::ListUnavailable
    })
}

async fn get_pokemon(
  State(state): State<AppState>,
  Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let key = normalize_key(&name);
  let pokemon = state.source.get_pokemon(&key).await.map_err(|e| {
    warn!(key = %key, error = %e, "lookup failed");
    ApiError::NotFound
  })?;

  // The forwarding shape carries no provenance fields
  Ok(Json(serde_json::json!({
    "id": pokemon.id,
    "name": pokemon.name,
    "height": pokemon.height,
    "weight": pokemon.weight,
    "types": pokemon.types,
    "sprite": pokemon.sprite,
    "abilities": pokemon.abilities,
    "stats": pokemon.stats,
  })))
}

async fn get_abilities(
  State(state): State<AppState>,
  Path(name): Path<String>,
) -> Result<Json<PokemonAbilities>, ApiError> {
  let key = normalize_key(&name);
  state
    .source
    .get_abilities(&key)
    .await
    .map(Json)
    .map_err(|e| {
      warn!(key = %key, error = %e, "abilities lookup failed");
      ApiError::NotFound
    })
}
