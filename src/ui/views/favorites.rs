use crate::pokeapi::Pokemon;
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{truncate, type_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::PokemonDetailView;
use crate::ui::Context;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Saved favorites, in the order they were added
pub struct FavoritesView {
  ctx: Context,
  query: Query<Vec<Pokemon>>,
  list_state: ListState,
}

impl FavoritesView {
  pub fn new(ctx: Context) -> Self {
    let service = ctx.service.clone();
    let favorites = ctx.favorites.clone();
    let query = Query::started(move || {
      let service = service.clone();
      let favorites = favorites.clone();
      async move {
        service
          .favorites(&favorites)
          .await
          .map_err(|e| e.to_string())
      }
    });

    Self {
      ctx,
      query,
      list_state: ListState::default(),
    }
  }

  fn entries(&self) -> &[Pokemon] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn remove_selected(&mut self) -> ViewAction {
    let Some(p) = self.list_state.selected().and_then(|i| self.entries().get(i)) else {
      return ViewAction::None;
    };
    let (id, name) = (p.id, p.name.clone());

    match self.ctx.favorites.remove(id) {
      Ok(()) => {
        self.query.refetch();
        ViewAction::Message(format!("{} removed from favorites", name))
      }
      Err(e) => ViewAction::Message(format!("Could not update favorites: {}", e)),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.entries().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " Favorites (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Favorites (error: {}) ", e),
      _ => format!(" Favorites ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load favorites. Press 'r' to retry."
      } else {
        "No favorites yet. Press 'f' on a Pokémon to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .entries()
      .iter()
      .map(|p| {
        let mut spans = vec![
          Span::styled("★ ", Style::default().fg(Color::Yellow)),
          Span::styled(format!("#{:<5}", p.id), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<24}", truncate(&p.name, 24))),
        ];
        spans.extend(p.types.iter().map(|kind| {
          Span::styled(format!("{} ", kind), Style::default().fg(type_color(kind)))
        }));
        if p.fallback {
          spans.push(Span::styled("(offline)", Style::default().fg(Color::Red)));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for FavoritesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('f') | KeyCode::Char('d') => return self.remove_selected(),
      KeyCode::Enter => {
        if let Some(p) = self.list_state.selected().and_then(|i| self.entries().get(i)) {
          return ViewAction::Push(Box::new(PokemonDetailView::new(
            self.ctx.clone(),
            p.id.to_string(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Favorites".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("d", "remove").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pokeapi::testing::FakeSource;
  use crate::ui::views::testing::{context, key, message, settle};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_lists_favorites_in_order() {
    let ctx = context(Arc::new(FakeSource::with_catalog()), true);
    ctx.favorites.toggle(25).unwrap();
    ctx.favorites.toggle(1).unwrap();

    let mut view = FavoritesView::new(ctx);
    settle(&mut view).await;

    let names: Vec<_> = view.entries().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["pikachu", "bulbasaur"]);
  }

  #[tokio::test]
  async fn test_remove_refreshes_list() {
    let ctx = context(Arc::new(FakeSource::with_catalog()), true);
    ctx.favorites.toggle(4).unwrap();
    let mut view = FavoritesView::new(ctx);
    settle(&mut view).await;
    view.list_state.select(Some(0));

    let msg = message(view.handle_key(key(KeyCode::Char('d')))).unwrap();
    settle(&mut view).await;

    assert!(msg.contains("charmander removed"));
    assert!(view.entries().is_empty());
  }
}
