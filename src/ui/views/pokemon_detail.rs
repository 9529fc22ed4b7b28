use crate::cache::CacheSource;
use crate::pokeapi::Pokemon;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{stat_bar, stat_color, tenths, type_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{fallback_badge, toggle_favorite};
use crate::ui::Context;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

const BAR_WIDTH: usize = 30;

/// One Pokémon: types, abilities and base stats
pub struct PokemonDetailView {
  ctx: Context,
  key: String,
  query: Query<(Pokemon, CacheSource)>,
}

impl PokemonDetailView {
  pub fn new(ctx: Context, key: String) -> Self {
    let service = ctx.service.clone();
    let lookup = key.clone();
    let query = Query::started(move || {
      let service = service.clone();
      let key = lookup.clone();
      async move {
        service
          .get_pokemon(&key)
          .await
          .map(|result| (result.data, result.source))
          .map_err(|e| e.to_string())
      }
    });

    Self { ctx, key, query }
  }

  fn is_favorite(&self, id: u64) -> bool {
    self.ctx.favorites.contains(id).unwrap_or(false)
  }

  fn lines(&self, pokemon: &Pokemon, source: CacheSource) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);

    let mut status = vec![Span::styled(format!("from {}", source.label()), label)];
    if self.is_favorite(pokemon.id) {
      status.push(Span::styled("  ★ favorite", Style::default().fg(Color::Yellow)));
    }
    if pokemon.fallback {
      status.push(Span::raw("  "));
      status.push(fallback_badge());
    }

    let mut types = vec![Span::styled("Types:     ", label)];
    if pokemon.types.is_empty() {
      types.push(Span::styled("unknown", label));
    }
    for kind in &pokemon.types {
      types.push(Span::styled(
        format!("{} ", kind),
        Style::default().fg(type_color(kind)).bold(),
      ));
    }

    let abilities = if pokemon.abilities.is_empty() {
      "unknown".to_string()
    } else {
      pokemon.abilities.join(", ")
    };

    let mut lines = vec![
      Line::from(status),
      Line::default(),
      Line::from(types),
      Line::from(vec![
        Span::styled("Height:    ", label),
        Span::raw(tenths(pokemon.height, "m")),
        Span::styled("   Weight: ", label),
        Span::raw(tenths(pokemon.weight, "kg")),
      ]),
      Line::from(vec![Span::styled("Abilities: ", label), Span::raw(abilities)]),
      Line::from(vec![
        Span::styled("Sprite:    ", label),
        Span::raw(pokemon.sprite.clone()),
      ]),
      Line::default(),
    ];

    if pokemon.stats.is_empty() {
      lines.push(Line::styled("No stats available offline.", label));
      return lines;
    }

    for stat in &pokemon.stats {
      lines.push(Line::from(vec![
        Span::styled(format!("{:<16}", stat.name), label),
        Span::raw(format!("{:>4} ", stat.base)),
        Span::styled(stat_bar(stat.base, BAR_WIDTH), Style::default().fg(stat_color(stat.base))),
      ]));
    }
    lines.push(Line::from(vec![
      Span::styled(format!("{:<16}", "total"), label),
      Span::styled(format!("{:>4}", pokemon.total()), Style::default().bold()),
    ]));

    lines
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.key),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.key, e),
      _ => match self.query.data() {
        Some((p, _)) => format!(" {} #{} ", p.name, p.id),
        None => format!(" {} ", self.key),
      },
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!(
        "Could not load {}: {}\n\nPress 'r' to retry.",
        self.key, error
      ))
      .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some((pokemon, source)) = self.query.data() else {
      let paragraph =
        Paragraph::new("Loading Pokémon details...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    };

    let paragraph = Paragraph::new(self.lines(pokemon, *source)).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
  }
}

impl View for PokemonDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('f') => match self.query.data() {
        Some((p, _)) => toggle_favorite(&self.ctx, p.id, &p.name),
        None => ViewAction::None,
      },
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.key.clone()
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
