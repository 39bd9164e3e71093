use super::KeyResult;
use crate::api::types::NewsStatus;
use crate::ui::renderfns::status_color;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// Events emitted by status picker that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPickerEvent {
  /// Target column chosen for the given item
  Selected { id: String, status: NewsStatus },
  Cancelled,
}

/// Popup for moving a card to another column
#[derive(Debug, Clone, Default)]
pub struct StatusPicker {
  /// Item being moved, `Some` while the picker is open
  target: Option<String>,
  selected: usize,
  title: String,
}

impl StatusPicker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.target.is_some()
  }

  /// Open for `id`, preselecting the status after `current`
  pub fn show(&mut self, id: String, title: String, current: NewsStatus) {
    let at = NewsStatus::ALL.iter().position(|s| *s == current).unwrap_or(0);
    self.selected = (at + 1) % NewsStatus::ALL.len();
    self.target = Some(id);
    self.title = title;
  }

  pub fn hide(&mut self) {
    self.target = None;
    self.selected = 0;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<StatusPickerEvent> {
    if !self.is_active() {
      return KeyResult::NotHandled;
    }

    let count = NewsStatus::ALL.len();
    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(StatusPickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        let status = NewsStatus::ALL[self.selected % count];
        let event = match self.target.take() {
          Some(id) => StatusPickerEvent::Selected { id, status },
          None => StatusPickerEvent::Cancelled,
        };
        self.hide();
        KeyResult::Event(event)
      }
      KeyCode::Char('j') | KeyCode::Down => {
        self.selected = (self.selected + 1) % count;
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.selected = self.selected.checked_sub(1).unwrap_or(count - 1);
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.is_active() || area.width < 8 || area.height < 5 {
      return;
    }

    let width = (self.title.chars().count() as u16 + 6)
      .max(20)
      .min(area.width - 4);
    let height = (NewsStatus::ALL.len() as u16 + 2).min(area.height - 2);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let items: Vec<ListItem> = NewsStatus::ALL
      .iter()
      .map(|status| {
        ListItem::new(Line::from(Span::styled(
          status.label(),
          Style::default().fg(status_color(*status)),
        )))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
      .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(self.selected));
    frame.render_stateful_widget(list, overlay_area, &mut state);
  }
}
