//! Wire types for the public Pokémon API and their flattening.

use serde::Deserialize;

use super::types::{BasicPokemon, Links, Pokemon, PokemonPage, PokemonStat};

#[derive(Debug, Deserialize)]
pub struct ApiNamedResource {
  pub name: String,
  #[serde(default)]
  pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTypeSlot {
  #[serde(rename = "type")]
  pub kind: ApiNamedResource,
}

#[derive(Debug, Deserialize)]
pub struct ApiAbilitySlot {
  pub ability: ApiNamedResource,
}

#[derive(Debug, Deserialize)]
pub struct ApiStat {
  pub base_stat: u32,
  pub stat: ApiNamedResource,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSprites {
  pub front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub height: u32,
  #[serde(default)]
  pub weight: u32,
  #[serde(default)]
  pub types: Vec<ApiTypeSlot>,
  #[serde(default)]
  pub abilities: Vec<ApiAbilitySlot>,
  #[serde(default)]
  pub stats: Vec<ApiStat>,
  #[serde(default)]
  pub sprites: ApiSprites,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemonList {
  pub count: u64,
  pub results: Vec<ApiNamedResource>,
}

impl ApiPokemon {
  /// Flatten the nested wrappers into a [`Pokemon`].
  pub fn into_pokemon(self, links: &Links) -> Pokemon {
    let sprite = self
      .sprites
      .front_default
      .unwrap_or_else(|| links.sprite(self.id));

    Pokemon {
      id: self.id,
      url: links.pokemon(&self.id.to_string()),
      name: self.name,
      height: self.height,
      weight: self.weight,
      types: self.types.into_iter().map(|t| t.kind.name).collect(),
      sprite,
      abilities: self.abilities.into_iter().map(|a| a.ability.name).collect(),
      stats: self
        .stats
        .into_iter()
        .map(|s| PokemonStat {
          name: s.stat.name,
          base: s.base_stat,
        })
        .collect(),
      last_updated: 0,
      fallback: false,
    }
  }
}

impl ApiPokemonList {
  /// Number the results from `offset + 1`.
  pub fn into_page(self, offset: u32, links: &Links) -> PokemonPage {
    let pokemon = self
      .results
      .into_iter()
      .enumerate()
      .map(|(index, p)| {
        let id = u64::from(offset) + index as u64 + 1;
        BasicPokemon {
          id,
          name: p.name,
          url: p.url,
          sprite: links.sprite(id),
        }
      })
      .collect();

    PokemonPage {
      count: self.count,
      pokemon,
      stale: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PIKACHU: &str = r#"{
    "id": 25,
    "name": "pikachu",
    "height": 4,
    "weight": 60,
    "base_experience": 112,
    "types": [{"slot": 1, "type": {"name": "electric", "url": "https://pokeapi.co/api/v2/type/13/"}}],
    "abilities": [
      {"ability": {"name": "static", "url": ""}, "is_hidden": false, "slot": 1},
      {"ability": {"name": "lightning-rod", "url": ""}, "is_hidden": true, "slot": 3}
    ],
    "stats": [
      {"base_stat": 35, "effort": 0, "stat": {"name": "hp", "url": ""}},
      {"base_stat": 55, "effort": 0, "stat": {"name": "attack", "url": ""}}
    ],
    "sprites": {"front_default": "https://img.test/25.png", "back_default": null}
  }"#;

  fn links() -> Links {
    Links::new("http://localhost:3000/api/pokemon", "https://sprites.test")
  }

  #[test]
  fn test_flatten_pokemon() {
    let api: ApiPokemon = serde_json::from_str(PIKACHU).unwrap();
    let p = api.into_pokemon(&links());

    assert_eq!(p.id, 25);
    assert_eq!(p.name, "pikachu");
    assert_eq!(p.types, vec!["electric"]);
    assert_eq!(p.abilities, vec!["static", "lightning-rod"]);
    assert_eq!(p.stats[0], PokemonStat { name: "hp".into(), base: 35 });
    assert_eq!(p.sprite, "https://img.test/25.png");
    assert_eq!(p.url, "http://localhost:3000/api/pokemon/25");
    assert!(!p.fallback);
  }

  #[test]
  fn test_missing_sprite_uses_derived_url() {
    let api: ApiPokemon =
      serde_json::from_str(r#"{"id": 10001, "name": "deoxys-attack", "sprites": {"front_default": null}}"#)
        .unwrap();
    assert_eq!(api.into_pokemon(&links()).sprite, "https://sprites.test/10001.png");
  }

  #[test]
  fn test_list_numbering_starts_after_offset() {
    let api: ApiPokemonList = serde_json::from_str(
      r#"{"count": 1302, "next": null, "previous": null, "results": [
        {"name": "pikachu", "url": "https://pokeapi.co/api/v2/pokemon/25/"},
        {"name": "raichu", "url": "https://pokeapi.co/api/v2/pokemon/26/"}
      ]}"#,
    )
    .unwrap();

    let page = api.into_page(24, &links());
    assert_eq!(page.count, 1302);
    assert_eq!(page.pokemon[0].id, 25);
    assert_eq!(page.pokemon[1].id, 26);
    assert_eq!(page.pokemon[1].sprite, "https://sprites.test/26.png");
  }
}
