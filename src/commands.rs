/// Available commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
  Board,
  Profile,
  Public,
  Clear,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub id: CommandId,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    id: CommandId::Board,
    name: "board",
    aliases: &["b", "news", "kanban"],
    description: "News Kanban board",
  },
  Command {
    id: CommandId::Profile,
    name: "profile",
    aliases: &["p", "me", "account"],
    description: "View and edit your profile",
  },
  Command {
    id: CommandId::Public,
    name: "public",
    aliases: &["feed", "shared"],
    description: "News other users have shared",
  },
  Command {
    id: CommandId::Clear,
    name: "clear",
    aliases: &["c", "reset"],
    description: "Clear all board filters",
  },
  Command {
    id: CommandId::Quit,
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit newsboard",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve typed input to the best matching command
pub fn resolve(input: &str) -> Option<CommandId> {
  if input.trim().is_empty() {
    return None;
  }
  get_suggestions(input).first().map(|cmd| cmd.id)
}
