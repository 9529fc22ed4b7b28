use crate::pokeapi::{Comparison, Pokemon};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::stat_color;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::fallback_badge;
use crate::ui::Context;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

/// Two Pokémon side by side with per-stat differences
pub struct CompareView {
  first: String,
  second: String,
  query: Query<Comparison>,
}

impl CompareView {
  pub fn new(ctx: Context, first: String, second: String) -> Self {
    let service = ctx.service.clone();
    let (a, b) = (first.clone(), second.clone());
    let query = Query::started(move || {
      let service = service.clone();
      let (a, b) = (a.clone(), b.clone());
      async move { service.compare(&a, &b).await.map_err(|e| e.to_string()) }
    });

    Self {
      first,
      second,
      query,
    }
  }

  fn rows(comparison: &Comparison) -> Vec<Row<'static>> {
    let value = |p: &Pokemon, name: &str| match p.stat(name) {
      Some(v) => Cell::from(v.to_string()).style(Style::default().fg(stat_color(v))),
      None => Cell::from("-").style(Style::default().fg(Color::DarkGray)),
    };

    comparison
      .differences
      .iter()
      .map(|d| {
        let (sign, color) = match d.difference {
          n if n > 0 => ("+", Color::Green),
          n if n < 0 => ("", Color::Red),
          _ => ("", Color::DarkGray),
        };
        Row::new(vec![
          Cell::from(d.name.clone()).style(Style::default().fg(Color::DarkGray)),
          value(&comparison.first, &d.name),
          value(&comparison.second, &d.name),
          Cell::from(format!("{}{}", sign, d.difference)).style(Style::default().fg(color)),
        ])
      })
      .collect()
  }

  fn render_comparison(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} vs {} (loading...) ", self.first, self.second),
      QueryState::Error(e) => format!(" {} vs {} (error: {}) ", self.first, self.second, e),
      _ => format!(" {} vs {} ", self.first, self.second),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if self.query.is_error() {
      let paragraph = Paragraph::new("Failed to compare. Press 'r' to retry.")
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some(comparison) = self.query.data() else {
      frame.render_widget(
        Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray)),
        inner,
      );
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(2), Constraint::Min(1)])
      .split(inner);

    let mut badges = Vec::new();
    for p in [&comparison.first, &comparison.second] {
      if p.fallback {
        badges.push(Span::raw(format!("{}: ", p.name)));
        badges.push(fallback_badge());
        badges.push(Span::raw("  "));
      }
    }
    frame.render_widget(Paragraph::new(Line::from(badges)), chunks[0]);

    if comparison.differences.is_empty() {
      frame.render_widget(
        Paragraph::new("No stats to compare.").style(Style::default().fg(Color::DarkGray)),
        chunks[1],
      );
      return;
    }

    let header = Row::new(vec![
      Cell::from("stat"),
      Cell::from(comparison.first.name.clone()),
      Cell::from(comparison.second.name.clone()),
      Cell::from("diff"),
    ])
    .style(Style::default().fg(Color::Cyan).bold());

    let table = Table::new(
      Self::rows(comparison),
      [
        Constraint::Length(18),
        Constraint::Length(16),
        Constraint::Length(16),
        Constraint::Length(8),
      ],
    )
    .header(header);

    frame.render_widget(table, chunks[1]);
  }
}

impl View for CompareView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_comparison(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("{} vs {}", self.first, self.second)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pokeapi::testing::FakeSource;
  use crate::ui::views::testing::{context, settle};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_compares_both_records() {
    let ctx = context(Arc::new(FakeSource::with_catalog()), true);
    let mut view = CompareView::new(ctx, "bulbasaur".to_string(), "pikachu".to_string());
    settle(&mut view).await;

    let comparison = view.query.data().unwrap();
    assert_eq!(comparison.first.name, "bulbasaur");
    assert_eq!(comparison.differences[0].name, "hp");
    assert_eq!(comparison.differences[0].difference, 10);
    assert_eq!(CompareView::rows(comparison).len(), 2);
  }

  #[tokio::test]
  async fn test_failed_side_is_an_error() {
    let source = Arc::new(FakeSource::with_catalog());
    source.set_failing(true);
    let mut view = CompareView::new(
      context(source, true),
      "bulbasaur".to_string(),
      "pikachu".to_string(),
    );
    settle(&mut view).await;

    assert!(view.query.is_error());
  }
}
