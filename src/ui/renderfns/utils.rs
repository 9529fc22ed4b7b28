use ratatui::prelude::Color;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a Pokémon type
pub fn type_color(kind: &str) -> Color {
  match kind {
    "fire" => Color::Red,
    "water" | "ice" => Color::Blue,
    "grass" | "bug" => Color::Green,
    "electric" => Color::Yellow,
    "psychic" | "fairy" => Color::Magenta,
    "poison" | "ghost" | "dragon" => Color::LightMagenta,
    "ground" | "rock" | "fighting" => Color::LightRed,
    "flying" => Color::LightCyan,
    "dark" | "steel" => Color::Gray,
    _ => Color::White,
  }
}

/// Base stats top out at 255
pub const MAX_STAT: u32 = 255;

/// Horizontal bar of `width` cells filled in proportion to `value`
pub fn stat_bar(value: u32, width: usize) -> String {
  let filled = (value.min(MAX_STAT) as usize * width).div_ceil(MAX_STAT as usize);
  format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Color for a base stat value
pub fn stat_color(value: u32) -> Color {
  match value {
    0..=49 => Color::Red,
    50..=89 => Color::Yellow,
    _ => Color::Green,
  }
}

/// `1.8 m` style display of decimetres/hectograms
pub fn tenths(value: u32, unit: &str) -> String {
  format!("{}.{} {}", value / 10, value % 10, unit)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("mew", 10), "mew");
    assert_eq!(truncate("mew", 3), "mew");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("crabominable", 8), "crabo...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Pokémon pikachu", 10), "Pokémon...");
  }

  #[test]
  fn test_type_colors() {
    assert_eq!(type_color("fire"), Color::Red);
    assert_eq!(type_color("electric"), Color::Yellow);
    assert_eq!(type_color("unknown"), Color::White);
  }

  #[test]
  fn test_stat_bar_scales() {
    assert_eq!(stat_bar(0, 4), "░░░░");
    assert_eq!(stat_bar(255, 4), "████");
    assert_eq!(stat_bar(300, 4), "████");
    assert_eq!(stat_bar(100, 10).chars().filter(|c| *c == '█').count(), 4);
  }

  #[test]
  fn test_tenths() {
    assert_eq!(tenths(4, "m"), "0.4 m");
    assert_eq!(tenths(60, "kg"), "6.0 kg");
  }
}
