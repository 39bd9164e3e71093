use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Info,
  Error,
}

/// One-line outcome message shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub text: String,
  pub level: NoticeLevel,
}

impl Notice {
  pub fn info(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      level: NoticeLevel::Info,
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      level: NoticeLevel::Error,
    }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views own their input modes (forms, pickers) and return actions for
/// the App to execute: App → View → Components. Views that load data
/// read a `QuerySync` snapshot when rendering and drain finished
/// mutations in `tick()`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to collect results of background work
  fn tick(&mut self) {}

  /// Next message for the status line, if any
  fn take_notice(&mut self) -> Option<Notice> {
    None
  }

  /// True while a form or picker wants every key, `:` included
  fn captures_input(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
