use crate::commands::Invocation;
use crate::event::{Event, EventHandler};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{CompareView, FavoritesView, PokemonDetailView, PokemonListView};
use crate::ui::{self, Context};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,

  /// `:` command line, shared by every view
  command: CommandInput,

  ctx: Context,

  /// Shown in the header
  api_url: String,

  /// Last known effective connectivity
  online: bool,

  /// One-line status shown in the footer until the next key
  message: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(ctx: Context, api_url: String) -> Self {
    let online = ctx.service.connectivity().is_online();
    Self {
      views: vec![Box::new(PokemonListView::new(ctx.clone()))],
      command: CommandInput::new(),
      ctx,
      api_url,
      online,
      message: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    events.watch_connectivity(self.ctx.service.connectivity().subscribe());

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        for view in self.views.iter_mut() {
          view.tick();
        }
      }
      Event::Connectivity(online) => {
        info!(online, "browser connectivity changed");
        self.online = online;
        self.message = Some(if online {
          "Back online".to_string()
        } else {
          "You are offline, showing cached data".to_string()
        });
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.views.last().is_some_and(|v| v.captures_input());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(invocation)) => {
          self.execute(invocation);
          return;
        }
        KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::NotHandled if self.command.is_active() => return,
        KeyResult::NotHandled => {}
      }
    }

    self.message = None;
    if let Some(view) = self.views.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Message(message) => self.message = Some(message),
    }
  }

  /// Replace the whole stack with a new root view
  fn set_root(&mut self, view: Box<dyn View>) {
    self.views.clear();
    self.views.push(view);
  }

  fn execute(&mut self, invocation: Invocation) {
    let Invocation { name, args } = invocation;
    match name.as_str() {
      "pokemon" if args.is_empty() => {
        self.set_root(Box::new(PokemonListView::new(self.ctx.clone())));
      }
      "pokemon" => {
        let key = args.join(" ");
        self.apply(ViewAction::Push(Box::new(PokemonDetailView::new(
          self.ctx.clone(),
          key,
        ))));
      }
      "favorites" => {
        self.set_root(Box::new(FavoritesView::new(self.ctx.clone())));
      }
      "compare" => match args.as_slice() {
        [first, second] => {
          self.apply(ViewAction::Push(Box::new(CompareView::new(
            self.ctx.clone(),
            first.clone(),
            second.clone(),
          ))));
        }
        _ => self.message = Some("Usage: compare <a> <b>".to_string()),
      },
      "clear-cache" => {
        self.message = Some(match self.ctx.service.clear_cache() {
          Ok(()) => "Cache cleared".to_string(),
          Err(e) => {
            warn!(error = %e, "clear cache failed");
            format!("Could not clear cache: {}", e)
          }
        });
      }
      "offline" => {
        self.ctx.service.connectivity().set_forced_offline(true);
        self.online = false;
        self.message = Some("Offline mode on".to_string());
      }
      "online" => {
        let connectivity = self.ctx.service.connectivity();
        connectivity.set_forced_offline(false);
        self.online = connectivity.is_online();
        self.message = Some("Offline mode off".to_string());
      }
      "quit" => self.should_quit = true,
      other => self.message = Some(format!("Unknown command: {}", other)),
    }
  }

  // Accessors for UI rendering

  pub fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.views.last_mut() {
      view.render(frame, area);
    }
    self.command.render_overlay(frame, area);
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  pub fn is_online(&self) -> bool {
    self.online
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .views
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }
}
