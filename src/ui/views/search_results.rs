use crate::pokeapi::Pokemon;
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{truncate, type_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{toggle_favorite, PokemonDetailView};
use crate::ui::Context;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Pokémon whose name (or number) contains the query
pub struct SearchResultsView {
  ctx: Context,
  term: String,
  query: Query<Vec<Pokemon>>,
  list_state: ListState,
}

impl SearchResultsView {
  pub fn new(ctx: Context, term: String) -> Self {
    let service = ctx.service.clone();
    let search = term.clone();
    let query = Query::started(move || {
      let service = service.clone();
      let term = search.clone();
      async move { service.search(&term).await.map_err(|e| e.to_string()) }
    });

    Self {
      ctx,
      term,
      query,
      list_state: ListState::default(),
    }
  }

  fn results(&self) -> &[Pokemon] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&Pokemon> {
    self.list_state.selected().and_then(|i| self.results().get(i))
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.results().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => format!(" Search '{}' (loading...) ", self.term),
      QueryState::Error(e) => format!(" Search '{}' (error: {}) ", self.term, e),
      _ => format!(" Search '{}' ({}) ", self.term, len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Search failed. Press 'r' to retry.".to_string()
      } else {
        format!("No Pokémon match '{}'.", self.term)
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .results()
      .iter()
      .map(|p| {
        let mut spans = vec![
          Span::styled(format!("#{:<5}", p.id), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<24}", truncate(&p.name, 24))),
        ];
        for kind in &p.types {
          spans.push(Span::styled(
            format!("{} ", kind),
            Style::default().fg(type_color(kind)),
          ));
        }
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

impl View for SearchResultsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('f') => {
        if let Some(p) = self.selected() {
          return toggle_favorite(&self.ctx, p.id, &p.name);
        }
      }
      KeyCode::Enter => {
        if let Some(p) = self.selected() {
          return ViewAction::Push(Box::new(PokemonDetailView::new(
            self.ctx.clone(),
            p.name.clone(),
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
    format!("Search [{}]", self.term)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("f", "favorite").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
