/// Browser commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "pokemon",
    aliases: &["p", "list", "ls"],
    usage: "[name|id]",
    description: "Browse the Pokédex or open one Pokémon",
  },
  Command {
    name: "favorites",
    aliases: &["fav", "favs", "f"],
    usage: "",
    description: "Show favorite Pokémon",
  },
  Command {
    name: "compare",
    aliases: &["cmp", "vs"],
    usage: "<a> <b>",
    description: "Compare two Pokémon side by side",
  },
  Command {
    name: "clear-cache",
    aliases: &["clear"],
    usage: "",
    description: "Drop every cached record",
  },
  Command {
    name: "offline",
    aliases: &["off"],
    usage: "",
    description: "Stop using the network",
  },
  Command {
    name: "online",
    aliases: &["on"],
    usage: "",
    description: "Use the network again",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "",
    description: "Exit pokedex",
  },
];

/// A resolved command line: canonical name plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub name: String,
  pub args: Vec<String>,
}

/// Split input into the command word and the rest.
pub fn split(input: &str) -> (&str, &str) {
  let input = input.trim_start();
  match input.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (input, ""),
  }
}

/// Turn raw input into an invocation, taking the highlighted suggestion
/// for the command word when there is one.
pub fn resolve(input: &str, selected: usize) -> Option<Invocation> {
  let (word, rest) = split(input);
  if word.is_empty() {
    return None;
  }
  let name = match get_suggestions(word).get(selected) {
    Some(cmd) => cmd.name.to_string(),
    None => word.to_lowercase(),
  };

  Some(Invocation {
    name,
    args: rest.split_whitespace().map(String::from).collect(),
  })
}

/// Get autocomplete suggestions for the command word of `input`
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = split(input).0.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
    } else if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    } else if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    assert_eq!(get_suggestions("compare")[0].name, "compare");
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(get_suggestions("fav")[0].name, "favorites");
    assert_eq!(get_suggestions("q")[0].name, "quit");
  }

  #[test]
  fn test_prefix_beats_substring() {
    let names: Vec<_> = get_suggestions("on").iter().map(|c| c.name).collect();
    assert_eq!(names[0], "online");
    assert!(names.contains(&"pokemon"));
  }

  #[test]
  fn test_suggestions_ignore_arguments() {
    assert_eq!(get_suggestions("cmp pikachu raichu")[0].name, "compare");
  }

  #[test]
  fn test_resolve_keeps_arguments() {
    assert_eq!(
      resolve("vs  pikachu   raichu ", 0),
      Some(Invocation {
        name: "compare".to_string(),
        args: vec!["pikachu".to_string(), "raichu".to_string()],
      })
    );
  }

  #[test]
  fn test_resolve_uses_selected_suggestion() {
    let second = get_suggestions("o")[1].name;
    assert_eq!(resolve("o", 1).map(|i| i.name), Some(second.to_string()));
  }

  #[test]
  fn test_resolve_unknown_and_empty() {
    assert_eq!(resolve("zzz", 0).map(|i| i.name), Some("zzz".to_string()));
    assert_eq!(resolve("   ", 5), None);
  }
}
