use std::collections::HashSet;

use crate::cache::CacheSource;
use crate::pokeapi::{BasicPokemon, PokemonPage};
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  fallback_badge, toggle_favorite, CompareView, PokemonDetailView, SearchResultsView,
};
use crate::ui::Context;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::warn;

pub const PAGE_SIZE: u32 = 20;

/// Paginated listing of every Pokémon
pub struct PokemonListView {
  ctx: Context,
  limit: u32,
  offset: u32,
  query: Query<(PokemonPage, CacheSource)>,
  list_state: ListState,
  search: SearchInput,
  /// Live filter over the current page while the search overlay is open
  filter: String,
  /// Names picked with `m` for comparison
  marked: Vec<String>,
  favorite_ids: HashSet<u64>,
}

impl PokemonListView {
  pub fn new(ctx: Context) -> Self {
    Self::with_page(ctx, PAGE_SIZE, 0)
  }

  pub fn with_page(ctx: Context, limit: u32, offset: u32) -> Self {
    let query = Self::load(&ctx, limit, offset);
    let mut view = Self {
      ctx,
      limit,
      offset,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
      filter: String::new(),
      marked: Vec::new(),
      favorite_ids: HashSet::new(),
    };
    view.reload_favorites();
    view
  }

  fn load(ctx: &Context, limit: u32, offset: u32) -> Query<(PokemonPage, CacheSource)> {
    let service = ctx.service.clone();
    Query::started(move || {
      let service = service.clone();
      async move {
        service
          .fetch_list(limit, offset)
          .await
          .map(|result| (result.data, result.source))
          .map_err(|e| e.to_string())
      }
    })
  }

  fn reload_favorites(&mut self) {
    match self.ctx.favorites.ids() {
      Ok(ids) => self.favorite_ids = ids.into_iter().collect(),
      Err(e) => warn!(error = %e, "could not read favorites"),
    }
  }

  fn go_to(&mut self, offset: u32) {
    self.offset = offset;
    self.query = Self::load(&self.ctx, self.limit, offset);
    self.list_state.select(Some(0));
  }

  fn count(&self) -> u64 {
    self.query.data().map(|(page, _)| page.count).unwrap_or(0)
  }

  fn has_next(&self) -> bool {
    u64::from(self.offset + self.limit) < self.count()
  }

  /// Entries of the current page that pass the live filter
  fn visible(&self) -> Vec<&BasicPokemon> {
    let filter = self.filter.to_lowercase();
    self
      .query
      .data()
      .map(|(page, _)| {
        page
          .pokemon
          .iter()
          .filter(|p| filter.is_empty() || p.name.to_lowercase().contains(&filter))
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected(&self) -> Option<&BasicPokemon> {
    self
      .list_state
      .selected()
      .and_then(|i| self.visible().get(i).copied())
  }

  fn toggle_mark(&mut self) -> ViewAction {
    let Some(name) = self.selected().map(|p| p.name.clone()) else {
      return ViewAction::None;
    };

    if let Some(pos) = self.marked.iter().position(|m| *m == name) {
      self.marked.remove(pos);
      return ViewAction::Message(format!("{} unmarked", name));
    }

    self.marked.push(name.clone());
    if self.marked.len() < 2 {
      return ViewAction::Message(format!("{} marked, pick one more to compare", name));
    }

    let first = self.marked.remove(0);
    let second = self.marked.remove(0);
    ViewAction::Push(Box::new(CompareView::new(self.ctx.clone(), first, second)))
  }

  fn title(&self) -> String {
    match self.query.state() {
      QueryState::Loading => " Pokémon (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Pokémon (error: {}) ", e),
      _ => {
        let shown = self.query.data().map(|(p, _)| p.pokemon.len()).unwrap_or(0) as u32;
        let source = self.query.data().map(|(_, s)| s.label()).unwrap_or("");
        format!(
          " Pokémon {}-{} of {} [{}] ",
          (self.offset + 1).min(self.offset + shown),
          self.offset + shown,
          self.count(),
          source
        )
      }
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let mut title = vec![Span::raw(self.title())];
    let cached = self.query.data().is_some_and(|(page, source)| {
      page.stale || matches!(source, CacheSource::StaleStore | CacheSource::Fallback)
    });
    if cached {
      title.push(fallback_badge());
    }

    let block = Block::default()
      .title(Line::from(title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load Pokémon. Press 'r' to retry."
      } else if !self.filter.is_empty() {
        "No Pokémon on this page match. Press Enter to search them all."
      } else {
        "No Pokémon found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|p| {
        let favorite = if self.favorite_ids.contains(&p.id) { "★" } else { " " };
        let mark = if self.marked.contains(&p.name) { "◆" } else { " " };
        ListItem::new(Line::from(vec![
          Span::styled(favorite, Style::default().fg(Color::Yellow)),
          Span::styled(mark, Style::default().fg(Color::Magenta)),
          Span::styled(format!(" #{:<5}", p.id), Style::default().fg(Color::Cyan)),
          Span::raw(truncate(&p.name, 40)),
        ]))
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

impl View for PokemonListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(SearchEvent::Changed(filter)) => {
        self.filter = filter;
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted(query)) => {
        self.filter.clear();
        if query.is_empty() {
          return ViewAction::None;
        }
        return ViewAction::Push(Box::new(SearchResultsView::new(self.ctx.clone(), query)));
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right if self.has_next() => {
        self.go_to(self.offset + self.limit);
      }
      KeyCode::Char('p') | KeyCode::Left if self.offset > 0 => {
        self.go_to(self.offset.saturating_sub(self.limit));
      }
      KeyCode::Char('r') => {
        self.query.refetch();
        self.reload_favorites();
      }
      KeyCode::Char('f') => {
        if let Some((id, name)) = self.selected().map(|p| (p.id, p.name.clone())) {
          let action = toggle_favorite(&self.ctx, id, &name);
          self.reload_favorites();
          return action;
        }
      }
      KeyCode::Char('m') => return self.toggle_mark(),
      KeyCode::Enter => {
        if let Some(p) = self.selected() {
          let key = if p.name.is_empty() { p.id.to_string() } else { p.name.clone() };
          return ViewAction::Push(Box::new(PokemonDetailView::new(self.ctx.clone(), key)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Pokémon [page {}]", self.offset / self.limit.max(1) + 1)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("n/p", "page").with_priority(30),
      ShortcutInfo::new("f", "favorite").with_priority(40),
      ShortcutInfo::new("m", "compare").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(60),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pokeapi::testing::FakeSource;
  use crate::ui::views::testing::{context, key, message, settle};
  use std::sync::Arc;

  async fn loaded(limit: u32) -> PokemonListView {
    let ctx = context(Arc::new(FakeSource::with_catalog()), true);
    let mut view = PokemonListView::with_page(ctx, limit, 0);
    settle(&mut view).await;
    view.list_state.select(Some(0));
    view
  }

  #[tokio::test]
  async fn test_loads_first_page() {
    let view = loaded(2).await;
    let names: Vec<_> = view.visible().iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec!["bulbasaur", "charmander"]);
    assert_eq!(view.count(), 6);
    assert!(view.title().contains("1-2 of 6"));
  }

  #[tokio::test]
  async fn test_paging_stays_in_bounds() {
    let mut view = loaded(4).await;

    view.handle_key(key(KeyCode::Char('p')));
    assert_eq!(view.offset, 0);

    view.handle_key(key(KeyCode::Char('n')));
    assert_eq!(view.offset, 4);
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('n')));
    assert_eq!(view.offset, 4);

    view.handle_key(key(KeyCode::Char('p')));
    assert_eq!(view.offset, 0);
  }

  #[tokio::test]
  async fn test_favorite_toggle_persists() {
    let mut view = loaded(2).await;

    let msg = message(view.handle_key(key(KeyCode::Char('f')))).unwrap();

    assert!(msg.contains("bulbasaur added"));
    assert!(view.favorite_ids.contains(&1));
    assert_eq!(view.ctx.favorites.ids().unwrap(), vec![1]);
  }

  #[tokio::test]
  async fn test_two_marks_open_comparison() {
    let mut view = loaded(2).await;

    assert!(matches!(
      view.handle_key(key(KeyCode::Char('m'))),
      ViewAction::Message(_)
    ));
    view.handle_key(key(KeyCode::Char('j')));
    let action = view.handle_key(key(KeyCode::Char('m')));

    match action {
      ViewAction::Push(next) => assert_eq!(next.breadcrumb_label(), "bulbasaur vs charmander"),
      _ => panic!("expected comparison view"),
    }
    assert!(view.marked.is_empty());
  }

  #[tokio::test]
  async fn test_search_filters_then_opens_results() {
    let mut view = loaded(6).await;

    view.handle_key(key(KeyCode::Char('/')));
    assert!(view.captures_input());
    for c in "char".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(view.visible().len(), 4);

    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Push(next) => assert_eq!(next.breadcrumb_label(), "Search [char]"),
      _ => panic!("expected search results"),
    }
    assert_eq!(view.visible().len(), 6);
  }

  #[tokio::test]
  async fn test_enter_opens_detail() {
    let mut view = loaded(2).await;
    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Push(next) => assert_eq!(next.breadcrumb_label(), "bulbasaur"),
      _ => panic!("expected detail view"),
    }
  }

  #[tokio::test]
  async fn test_offline_without_cache_shows_error() {
    let ctx = context(Arc::new(FakeSource::with_catalog()), false);
    let mut view = PokemonListView::with_page(ctx, 2, 0);
    settle(&mut view).await;
    assert!(view.query.is_error());
  }
}
