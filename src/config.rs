use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub upstream: UpstreamConfig,
  pub server: ServerConfig,
  pub cache: CacheConfig,
  pub edge: EdgeConfig,
  /// Start with the network switched off
  pub offline: bool,
}

/// Which data source the browser and one-shot commands read from.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  /// The forwarding layer started with `pokedex serve`
  #[default]
  Backend,
  /// The public Pokémon API, reshaped client side
  Upstream,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub source: SourceKind,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:3000/api/pokemon".to_string(),
      source: SourceKind::Backend,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
  pub base_url: String,
  pub sprite_base_url: String,
}

impl Default for UpstreamConfig {
  fn default() -> Self {
    Self {
      base_url: "https://pokeapi.co/api/v2/pokemon".to_string(),
      sprite_base_url:
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "127.0.0.1".to_string(),
      port: 3000,
    }
  }
}

impl ServerConfig {
  pub fn addr(&self) -> Result<SocketAddr> {
    format!("{}:{}", self.host, self.port)
      .parse()
      .map_err(|e| eyre!("Invalid server address {}:{}: {}", self.host, self.port, e))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// SQLite file; defaults to the user data directory
  pub path: Option<PathBuf>,
  /// Age in seconds after which stored records are stale
  pub freshness_secs: u64,
  /// Size of the listing used as the search corpus
  pub full_list_limit: u32,
  /// Let a placeholder replace a stored real record
  pub fallback_overwrites_real: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      freshness_secs: 24 * 60 * 60,
      full_list_limit: 1000,
      fallback_overwrites_real: false,
    }
  }
}

impl CacheConfig {
  pub fn freshness(&self) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(self.freshness_secs).unwrap_or(i64::MAX / 1000))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
  pub listen: String,
  /// Application origin the edge sits in front of
  pub origin: String,
  /// Path prefix handled with the API strategy
  pub api_prefix: String,
  /// SQLite file for the response cache; defaults to the user data directory
  pub path: Option<PathBuf>,
  pub static_cache: String,
  pub api_cache: String,
  /// Paths fetched into the static cache on install
  pub precache: Vec<String>,
  pub placeholder_image: String,
  /// Document served when navigation fails and nothing better is cached
  pub app_shell: String,
}

impl Default for EdgeConfig {
  fn default() -> Self {
    Self {
      listen: "127.0.0.1:8080".to_string(),
      origin: "http://localhost:5173".to_string(),
      api_prefix: "/api/".to_string(),
      path: None,
      static_cache: "pokeapp-v2".to_string(),
      api_cache: "pokeapp-api-v1".to_string(),
      precache: [
        "/",
        "/index.html",
        "/faviconP.ico",
        "/manifest.json",
        "/assets/pikachuError.jpg",
        "/assets/pokemon.jpg",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      placeholder_image: "/assets/pikachuError.jpg".to_string(),
      app_shell: "/index.html".to_string(),
    }
  }
}

impl EdgeConfig {
  pub fn listen_addr(&self) -> Result<SocketAddr> {
    self
      .listen
      .parse()
      .map_err(|e| eyre!("Invalid edge listen address {}: {}", self.listen, e))
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pokedex.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pokedex/config.yaml
  ///
  /// With no file at all the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pokedex.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pokedex").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Apply `PORT` and `POKEDEX_API_URL` overrides.
  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(port) = var("PORT") {
      self.server.port = port
        .trim()
        .parse()
        .map_err(|e| eyre!("Invalid PORT {}: {}", port, e))?;
    }
    if let Some(url) = var("POKEDEX_API_URL") {
      self.api.base_url = url;
    }
    Ok(())
  }
}
