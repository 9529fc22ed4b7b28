mod compare;
mod favorites;
mod pokemon_detail;
mod pokemon_list;
mod search_results;

pub use compare::CompareView;
pub use favorites::FavoritesView;
pub use pokemon_detail::PokemonDetailView;
pub use pokemon_list::PokemonListView;
pub use search_results::SearchResultsView;

use crate::ui::view::ViewAction;
use crate::ui::Context;
use ratatui::prelude::*;
use tracing::warn;

/// Flip a favorite and report the outcome in the footer.
fn toggle_favorite(ctx: &Context, id: u64, name: &str) -> ViewAction {
  if id == 0 {
    return ViewAction::Message(format!("{} has no number to save yet", name));
  }
  match ctx.favorites.toggle(id) {
    Ok(true) => ViewAction::Message(format!("★ {} added to favorites", name)),
    Ok(false) => ViewAction::Message(format!("{} removed from favorites", name)),
    Err(e) => {
      warn!(id, error = %e, "favorite toggle failed");
      ViewAction::Message(format!("Could not update favorites: {}", e))
    }
  }
}

/// Red badge shown on synthesized records
fn fallback_badge() -> Span<'static> {
  Span::styled(
    " offline/fallback data ",
    Style::default().fg(Color::White).bg(Color::Red).bold(),
  )
}
