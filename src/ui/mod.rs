pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use crate::cache::SqliteStorage;
use crate::favorites::Favorites;
use crate::pokeapi::PokemonService;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Handles every view needs to load and change data
#[derive(Clone)]
pub struct Context {
  pub service: PokemonService<SqliteStorage>,
  pub favorites: Favorites,
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  renderfns::draw_header(
    frame,
    chunks[0],
    app.api_url(),
    app.is_online(),
    &app.shortcuts(),
  );

  app.render_view(frame, chunks[1]);

  renderfns::draw_footer(frame, chunks[2], &app.breadcrumb(), app.message());
}

/// Keep a list selection inside `len` items, selecting the first when unset.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}
