mod api_types;
mod cache;
mod client;
mod error;
mod service;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use cache::{normalize_key, CacheManager};
pub use client::{BackendClient, PokemonSource, UpstreamClient};
pub use error::FetchError;
pub use service::PokemonService;
pub use types::{BasicPokemon, Comparison, Links, Pokemon, PokemonAbilities, PokemonPage};
