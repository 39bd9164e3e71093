use crate::api::types::{NewsCategory, NewsStatus};
use ratatui::prelude::Color;

/// Truncate to `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
  format!("{}...", kept)
}

pub fn status_color(status: NewsStatus) -> Color {
  match status {
    NewsStatus::Pending => Color::White,
    NewsStatus::Reading => Color::Yellow,
    NewsStatus::Read => Color::Green,
  }
}

pub fn category_color(category: NewsCategory) -> Color {
  match category {
    NewsCategory::General => Color::Gray,
    NewsCategory::Research => Color::Magenta,
    NewsCategory::Product => Color::Cyan,
    NewsCategory::Company => Color::Blue,
    NewsCategory::Tutorial => Color::Green,
    NewsCategory::Opinion => Color::Yellow,
  }
}
