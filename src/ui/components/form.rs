use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Field values in declaration order
  Submitted(Vec<String>),
  Cancelled,
}

#[derive(Debug, Clone)]
struct Field {
  label: &'static str,
  input: TextInput,
}

/// Stack of labelled inputs shown as a centered popup.
///
/// Tab/Down and Shift-Tab/Up move between fields; Enter on the last field
/// submits, Enter elsewhere moves on.
#[derive(Debug, Clone)]
pub struct Form {
  title: String,
  fields: Vec<Field>,
  focus: usize,
}

impl Form {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      fields: Vec::new(),
      focus: 0,
    }
  }

  pub fn field(mut self, label: &'static str, value: &str) -> Self {
    let mut input = TextInput::new();
    input.set_value(value);
    self.fields.push(Field { label, input });
    self
  }

  pub fn secret(mut self, label: &'static str) -> Self {
    self.fields.push(Field {
      label,
      input: TextInput::masked(),
    });
    self
  }

  fn values(&self) -> Vec<String> {
    self
      .fields
      .iter()
      .map(|f| f.input.value().to_string())
      .collect()
  }

  fn focus_next(&mut self) {
    if !self.fields.is_empty() {
      self.focus = (self.focus + 1) % self.fields.len();
    }
  }

  fn focus_prev(&mut self) {
    if !self.fields.is_empty() {
      self.focus = self.focus.checked_sub(1).unwrap_or(self.fields.len() - 1);
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus_next();
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus_prev();
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focus) else {
      return KeyResult::Event(FormEvent::Cancelled);
    };
    match field.input.handle_key(key) {
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Submitted(_) if self.focus + 1 < self.fields.len() => {
        self.focus_next();
        KeyResult::Handled
      }
      InputResult::Submitted(_) => KeyResult::Event(FormEvent::Submitted(self.values())),
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let height = (self.fields.len() as u16 + 4).min(area.height);
    let width = 56.min(area.width);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let popup = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.chars().count())
      .max()
      .unwrap_or(0);
    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(idx, field)| {
        let focused = idx == self.focus;
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };
        let mut spans = vec![Span::styled(
          format!("{:>width$}: ", field.label, width = label_width),
          label_style,
        )];
        spans.extend(field.input.render_line(focused).spans);
        Line::from(spans)
      })
      .collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
      "Tab next field  Enter submit  Esc cancel",
      Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).block(block), popup);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn press(form: &mut Form, code: KeyCode) -> KeyResult<FormEvent> {
    form.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
  }

  fn type_str(form: &mut Form, text: &str) {
    for c in text.chars() {
      press(form, KeyCode::Char(c));
    }
  }

  #[test]
  fn test_enter_walks_fields_then_submits() {
    let mut form = Form::new("Edit").field("Username", "alice").field("Email", "");
    type_str(&mut form, "_2");
    assert_eq!(press(&mut form, KeyCode::Enter), KeyResult::Handled);
    type_str(&mut form, "a@b.io");
    assert_eq!(
      press(&mut form, KeyCode::Enter),
      KeyResult::Event(FormEvent::Submitted(vec![
        "alice_2".to_string(),
        "a@b.io".to_string()
      ]))
    );
  }

  #[test]
  fn test_escape_cancels_from_any_field() {
    let mut form = Form::new("Password").secret("Current").secret("New");
    press(&mut form, KeyCode::Tab);
    assert_eq!(
      press(&mut form, KeyCode::Esc),
      KeyResult::Event(FormEvent::Cancelled)
    );
  }
}
