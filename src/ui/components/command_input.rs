use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command, CommandId};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Events emitted by command input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// A known command was chosen
  Run(CommandId),
  /// Input matched nothing
  Unknown(String),
  Cancelled,
}

/// `:` prompt with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn deactivate(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Handle a key event. Also handles activation, so call it in normal mode too.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.deactivate();
        return KeyResult::Event(CommandEvent::Cancelled);
      }
      KeyCode::Enter => {
        let event = self.resolve_command();
        self.deactivate();
        return KeyResult::Event(event);
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.suggestions().len();
        if count > 0 {
          self.selected_suggestion = self.selected_suggestion.checked_sub(1).unwrap_or(count - 1);
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.input.handle_key(key) {
      InputResult::Consumed => {
        self.selected_suggestion = 0;
        KeyResult::Handled
      }
      InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
      // Swallow everything else while the prompt is open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Suggestion picked with Tab, else the best match for what was typed
  fn resolve_command(&self) -> CommandEvent {
    let typed = self.input.value().trim();
    if self.selected_suggestion > 0 {
      if let Some(cmd) = self.suggestions().get(self.selected_suggestion) {
        return CommandEvent::Run(cmd.id);
      }
    }
    match commands::resolve(typed) {
      Some(id) => CommandEvent::Run(id),
      None if typed.is_empty() => CommandEvent::Cancelled,
      None => CommandEvent::Unknown(typed.to_string()),
    }
  }

  /// Render the command overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active || area.width < 4 || area.height < 3 {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(8) as u16;
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width - 2);
    let height = (3 + shown).min(area.height - 1);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height);

    frame.render_widget(Clear, overlay_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    if inner.height == 0 {
      return;
    }

    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);

    let mut prompt = vec![Span::styled(":", Style::default().fg(Color::Yellow))];
    prompt.extend(self.input.render_line(true).spans);
    frame.render_widget(Paragraph::new(Line::from(prompt)), chunks[0]);

    if suggestions.is_empty() || chunks[1].height == 0 {
      return;
    }
    let items: Vec<ListItem> = suggestions
      .iter()
      .take(8)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, chunks[1], &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn press(input: &mut CommandInput, code: KeyCode) -> KeyResult<CommandEvent> {
    input.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
  }

  fn type_str(input: &mut CommandInput, text: &str) {
    for c in text.chars() {
      press(input, KeyCode::Char(c));
    }
  }

  #[test]
  fn test_inactive_ignores_keys() {
    let mut input = CommandInput::new();
    assert_eq!(press(&mut input, KeyCode::Char('p')), KeyResult::NotHandled);
    assert!(!input.is_active());
  }

  #[test]
  fn test_prefix_resolves_to_command() {
    let mut input = CommandInput::new();
    press(&mut input, KeyCode::Char(':'));
    type_str(&mut input, "pro");
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      KeyResult::Event(CommandEvent::Run(CommandId::Profile))
    );
    assert!(!input.is_active());
  }

  #[test]
  fn test_tab_selects_next_suggestion() {
    let mut input = CommandInput::new();
    press(&mut input, KeyCode::Char(':'));
    // Empty input lists every command in table order
    press(&mut input, KeyCode::Tab);
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      KeyResult::Event(CommandEvent::Run(CommandId::Profile))
    );
  }

  #[test]
  fn test_unknown_command() {
    let mut input = CommandInput::new();
    press(&mut input, KeyCode::Char(':'));
    type_str(&mut input, "zzz");
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      KeyResult::Event(CommandEvent::Unknown("zzz".to_string()))
    );
  }

  #[test]
  fn test_alias_and_empty_enter() {
    let mut input = CommandInput::new();
    press(&mut input, KeyCode::Char(':'));
    type_str(&mut input, "me");
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      KeyResult::Event(CommandEvent::Run(CommandId::Profile))
    );

    press(&mut input, KeyCode::Char(':'));
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      KeyResult::Event(CommandEvent::Cancelled)
    );
  }

  #[test]
  fn test_escape_cancels() {
    let mut input = CommandInput::new();
    press(&mut input, KeyCode::Char(':'));
    type_str(&mut input, "qu");
    assert_eq!(
      press(&mut input, KeyCode::Esc),
      KeyResult::Event(CommandEvent::Cancelled)
    );
    assert!(!input.is_active());
  }
}
