mod app;
mod cache;
mod commands;
mod config;
mod connectivity;
mod edge;
mod event;
mod favorites;
mod logging;
mod pokeapi;
mod query;
mod server;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::{CacheLayer, SqliteStorage};
use crate::config::{Config, SourceKind};
use crate::connectivity::Connectivity;
use crate::edge::{Edge, EdgeSettings, HttpOrigin, ResponseStore};
use crate::favorites::Favorites;
use crate::pokeapi::{
  BackendClient, CacheManager, Links, PokemonService, PokemonSource, UpstreamClient,
};
use crate::ui::Context;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "An offline-first Pokédex: terminal browser, API server and caching proxy")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pokedex.yaml or $XDG_CONFIG_HOME/pokedex/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Never touch the network; serve cached or placeholder data
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse the Pokédex in the terminal (default)
  Browse,
  /// Run the forwarding API in front of the public Pokémon API
  Serve,
  /// Run the caching proxy in front of the web app
  Edge,
  /// Print one Pokémon by name or number
  Get { id_or_name: String },
  /// Print the abilities of one Pokémon
  Abilities { id_or_name: String },
  /// Print one page of the listing
  List {
    #[arg(long, default_value_t = 20)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
  },
  /// Print Pokémon whose name or number contains the query
  Search { query: String },
  /// Print two Pokémon and their stat differences
  Compare { first: String, second: String },
  /// Add or remove a favorite by number
  Favorite { id: u64 },
  /// Drop every cached record (favorites are kept)
  ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if args.offline {
    config.offline = true;
  }

  let command = args.command.unwrap_or(Command::Browse);

  // The browser owns the terminal, so it logs to a file
  let _log_guard = match command {
    Command::Browse => Some(logging::init_file()?),
    _ => {
      logging::init_stderr();
      None
    }
  };

  match command {
    Command::Serve => serve(&config).await,
    Command::Edge => run_edge(&config).await,
    command => {
      let source = pokemon_source(&config)?;
      let ctx = context(&config, Arc::clone(&source))?;
      match command {
        Command::Browse => browse(&config, ctx, source).await,
        command => one_shot(command, ctx).await,
      }
    }
  }
}

fn links(config: &Config) -> Links {
  Links::new(&config.api.base_url, &config.upstream.sprite_base_url)
}

/// The network side of the data access layer, per `api.source`
fn pokemon_source(config: &Config) -> Result<Arc<dyn PokemonSource>> {
  Ok(match config.api.source {
    SourceKind::Backend => Arc::new(BackendClient::new(&config.api.base_url)?),
    SourceKind::Upstream => Arc::new(UpstreamClient::new(
      &config.upstream.base_url,
      links(config),
    )?),
  })
}

fn context(config: &Config, source: Arc<dyn PokemonSource>) -> Result<Context> {
  let storage = Arc::new(SqliteStorage::open(config.cache.path.as_deref())?);
  let layer = CacheLayer::new(Arc::clone(&storage))
    .with_freshness(config.cache.freshness())
    .with_fallback_overwrites_real(config.cache.fallback_overwrites_real);

  let service = PokemonService::new(
    source,
    Arc::new(CacheManager::new(layer)),
    Connectivity::new(!config.offline),
    links(config),
  )
  .with_full_list_limit(config.cache.full_list_limit);

  Ok(Context {
    service,
    favorites: Favorites::new(storage),
  })
}

async fn browse(config: &Config, ctx: Context, source: Arc<dyn PokemonSource>) -> Result<()> {
  info!(api = %config.api.base_url, offline = config.offline, "starting browser");
  let probe = ctx
    .service
    .connectivity()
    .spawn_probe(source, PROBE_INTERVAL);

  let mut app = app::App::new(ctx, config.api.base_url.clone());
  let result = app.run().await;

  probe.abort();
  result
}

async fn serve(config: &Config) -> Result<()> {
  let addr = config.server.addr()?;
  let links = Links::new(
    format!("http://{}/api/pokemon", addr),
    &config.upstream.sprite_base_url,
  );
  let source = UpstreamClient::new(&config.upstream.base_url, links)?;

  server::run(
    addr,
    server::AppState {
      source: Arc::new(source),
    },
  )
  .await
}

async fn run_edge(config: &Config) -> Result<()> {
  let origin = HttpOrigin::new(&config.edge.origin)?;
  let store = ResponseStore::open(config.edge.path.as_deref())?;
  info!(origin = %config.edge.origin, "starting edge proxy");

  let edge = Edge::new(
    Arc::new(origin),
    Arc::new(store),
    EdgeSettings::from_config(config),
  );
  edge::run(config.edge.listen_addr()?, Arc::new(edge)).await
}

async fn one_shot(command: Command, ctx: Context) -> Result<()> {
  let service = &ctx.service;
  match command {
    Command::Get { id_or_name } => {
      let resolved = service.get_pokemon(&id_or_name).await?;
      info!(source = resolved.source.label(), "resolved");
      print_json(&resolved.data)
    }
    Command::Abilities { id_or_name } => print_json(&service.get_abilities(&id_or_name).await?),
    Command::List { limit, offset } => {
      let page = service.fetch_list(limit, offset).await?;
      info!(source = page.source.label(), "resolved");
      print_json(&page.data)
    }
    Command::Search { query } => print_json(&service.search(&query).await?),
    Command::Compare { first, second } => print_json(&service.compare(&first, &second).await?),
    Command::Favorite { id } => {
      let favorite = ctx.favorites.toggle(id)?;
      print_json(&json!({ "id": id, "favorite": favorite }))
    }
    Command::ClearCache => {
      service.clear_cache()?;
      print_json(&json!({ "cleared": true }))
    }
    Command::Browse | Command::Serve | Command::Edge => {
      Err(eyre!("{:?} is not a one-shot command", command))
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", out);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_command_is_browse() {
    let args = Args::try_parse_from(["pokedex"]).unwrap();
    assert!(args.command.is_none());
    assert!(!args.offline);
  }

  #[test]
  fn test_global_flags_after_subcommand() {
    let args = Args::try_parse_from(["pokedex", "get", "pikachu", "--offline"]).unwrap();
    assert!(args.offline);
    assert!(matches!(args.command, Some(Command::Get { id_or_name }) if id_or_name == "pikachu"));
  }

  #[test]
  fn test_list_defaults() {
    let args = Args::try_parse_from(["pokedex", "list", "--limit", "5"]).unwrap();
    assert!(matches!(
      args.command,
      Some(Command::List {
        limit: 5,
        offset: 0
      })
    ));
  }

  #[test]
  fn test_abilities_subcommand() {
    let args = Args::try_parse_from(["pokedex", "abilities", "25"]).unwrap();
    assert!(matches!(args.command, Some(Command::Abilities { id_or_name }) if id_or_name == "25"));
  }

  #[test]
  fn test_clear_cache_subcommand_name() {
    let args = Args::try_parse_from(["pokedex", "clear-cache"]).unwrap();
    assert!(matches!(args.command, Some(Command::ClearCache)));
  }
}
