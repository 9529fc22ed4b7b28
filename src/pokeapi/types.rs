use serde::{Deserialize, Serialize};

/// One base stat, e.g. `hp: 35`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonStat {
  pub name: String,
  pub base: u32,
}

/// Full, flattened record for one Pokémon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pokemon {
  pub id: u64,
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub url: String,
  #[serde(default)]
  pub height: u32,
  #[serde(default)]
  pub weight: u32,
  #[serde(default)]
  pub types: Vec<String>,
  #[serde(default)]
  pub sprite: String,
  #[serde(default)]
  pub abilities: Vec<String>,
  #[serde(default)]
  pub stats: Vec<PokemonStat>,
  /// Milliseconds since the epoch; zero until the record passes through the cache
  #[serde(default, skip_serializing_if = "is_zero")]
  pub last_updated: i64,
  /// Synthesized placeholder, never a real upstream record
  #[serde(rename = "__fallback", default, skip_serializing_if = "is_false")]
  pub fallback: bool,
}

/// Minimal pointer used in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicPokemon {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub sprite: String,
}

/// One page of the listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonPage {
  pub count: u64,
  pub pokemon: Vec<BasicPokemon>,
  /// Set by the edge proxy when it served synthesized data
  #[serde(rename = "__stale", default, skip_serializing_if = "is_false")]
  pub stale: bool,
}

/// Name plus ability list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonAbilities {
  pub name: String,
  pub abilities: Vec<String>,
}

/// Signed difference of one stat between two Pokémon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDifference {
  pub name: String,
  pub difference: i64,
}

/// Side-by-side comparison of two Pokémon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
  pub first: Pokemon,
  pub second: Pokemon,
  pub differences: Vec<StatDifference>,
}

/// URL templates for links the client has to make up itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
  /// Base of the entity endpoint, e.g. `http://localhost:3000/api/pokemon`
  pub api_base: String,
  /// Directory of front sprites, addressed by `{id}.png`
  pub sprite_base: String,
}

impl Links {
  pub fn new(api_base: impl Into<String>, sprite_base: impl Into<String>) -> Self {
    Self {
      api_base: api_base.into().trim_end_matches('/').to_string(),
      sprite_base: sprite_base.into().trim_end_matches('/').to_string(),
    }
  }

  pub fn sprite(&self, id: u64) -> String {
    format!("{}/{}.png", self.sprite_base, id)
  }

  pub fn pokemon(&self, key: &str) -> String {
    format!("{}/{}", self.api_base, key)
  }
}

impl Pokemon {
  /// Build the placeholder served when no real data exists for `key`.
  ///
  /// The id is parsed from the key (0 when it is a name) and the sprite is
  /// derived from that id, so the same key always yields the same record.
  pub fn placeholder(key: &str, links: &Links) -> Self {
    let id = key.parse().unwrap_or(0);
    Self {
      id,
      name: placeholder_name(key),
      url: links.pokemon(key),
      height: 0,
      weight: 0,
      types: Vec::new(),
      sprite: links.sprite(id),
      abilities: Vec::new(),
      stats: Vec::new(),
      last_updated: 0,
      fallback: true,
    }
  }

  pub fn stat(&self, name: &str) -> Option<u32> {
    self.stats.iter().find(|s| s.name == name).map(|s| s.base)
  }

  /// Sum of all base stats
  pub fn total(&self) -> u32 {
    self.stats.iter().map(|s| s.base).sum()
  }
}

impl From<&Pokemon> for PokemonAbilities {
  fn from(pokemon: &Pokemon) -> Self {
    Self {
      name: pokemon.name.clone(),
      abilities: pokemon.abilities.clone(),
    }
  }
}

impl Comparison {
  /// Pair stats by position and subtract `second` from `first`.
  pub fn between(first: Pokemon, second: Pokemon) -> Self {
    let differences = first
      .stats
      .iter()
      .zip(second.stats.iter())
      .map(|(a, b)| StatDifference {
        name: a.name.clone(),
        difference: i64::from(a.base) - i64::from(b.base),
      })
      .collect();

    Self {
      first,
      second,
      differences,
    }
  }
}

/// Display name for a record that has no real data
pub fn placeholder_name(key: &str) -> String {
  format!("Pokémon {}", key)
}

fn is_zero(n: &i64) -> bool {
  *n == 0
}

fn is_false(b: &bool) -> bool {
  !*b
}

#[cfg(test)]
mod tests {
  use super::*;

  fn links() -> Links {
    Links::new("http://localhost:3000/api/pokemon/", "https://sprites.test/pokemon")
  }

  fn stats(values: &[(&str, u32)]) -> Vec<PokemonStat> {
    values
      .iter()
      .map(|(name, base)| PokemonStat {
        name: name.to_string(),
        base: *base,
      })
      .collect()
  }

  #[test]
  fn test_placeholder_for_name() {
    let p = Pokemon::placeholder("pikachu", &links());
    assert_eq!(p.id, 0);
    assert_eq!(p.name, "Pokémon pikachu");
    assert_eq!(p.sprite, "https://sprites.test/pokemon/0.png");
    assert_eq!(p.url, "http://localhost:3000/api/pokemon/pikachu");
    assert!(p.fallback);
    assert!(p.types.is_empty() && p.abilities.is_empty() && p.stats.is_empty());
  }

  #[test]
  fn test_placeholder_for_numeric_key() {
    let p = Pokemon::placeholder("25", &links());
    assert_eq!(p.id, 25);
    assert_eq!(p.sprite, "https://sprites.test/pokemon/25.png");
  }

  #[test]
  fn test_placeholder_is_deterministic() {
    assert_eq!(
      Pokemon::placeholder("mew", &links()),
      Pokemon::placeholder("mew", &links())
    );
  }

  #[test]
  fn test_fallback_marker_serialization() {
    let json = serde_json::to_value(Pokemon::placeholder("1", &links())).unwrap();
    assert_eq!(json["__fallback"], true);
    assert!(json.get("lastUpdated").is_none());

    let mut real = Pokemon::placeholder("1", &links());
    real.fallback = false;
    real.last_updated = 5;
    let json = serde_json::to_value(real).unwrap();
    assert!(json.get("__fallback").is_none());
    assert_eq!(json["lastUpdated"], 5);
  }

  #[test]
  fn test_flat_record_deserializes_with_missing_fields() {
    let p: Pokemon = serde_json::from_str(r#"{"id": 7, "name": "squirtle"}"#).unwrap();
    assert_eq!(p.id, 7);
    assert!(!p.fallback);
    assert!(p.stats.is_empty());
  }

  #[test]
  fn test_comparison_differences_follow_stat_order() {
    let mut a = Pokemon::placeholder("a", &links());
    a.stats = stats(&[("hp", 45), ("attack", 49), ("speed", 45)]);
    let mut b = Pokemon::placeholder("b", &links());
    b.stats = stats(&[("hp", 39), ("attack", 52)]);

    let comparison = Comparison::between(a, b);
    assert_eq!(
      comparison.differences,
      vec![
        StatDifference {
          name: "hp".into(),
          difference: 6
        },
        StatDifference {
          name: "attack".into(),
          difference: -3
        },
      ]
    );
  }

  #[test]
  fn test_stat_lookup_and_total() {
    let mut p = Pokemon::placeholder("a", &links());
    p.stats = stats(&[("hp", 10), ("speed", 20)]);
    assert_eq!(p.stat("speed"), Some(20));
    assert_eq!(p.stat("attack"), None);
    assert_eq!(p.total(), 30);
  }

  #[test]
  fn test_page_stale_marker() {
    let page: PokemonPage =
      serde_json::from_str(r#"{"count": 0, "pokemon": [], "__stale": true}"#).unwrap();
    assert!(page.stale);
  }
}
