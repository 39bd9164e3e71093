use crate::api::types::NewsItem;
use crate::ui::renderfns::{category_color, status_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Read-only view of one news item
pub struct NewsDetailView {
  item: NewsItem,
  scroll: u16,
}

impl NewsDetailView {
  pub fn new(item: NewsItem) -> Self {
    Self { item, scroll: 0 }
  }

  fn lines(&self) -> Vec<Line<'static>> {
    let item = &self.item;
    let dim = Style::default().fg(Color::DarkGray);
    let timestamp = |ts: Option<chrono::DateTime<chrono::Utc>>| {
      ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
    };

    let mut lines = vec![
      Line::from(Span::styled(item.title.clone(), Style::default().bold())),
      Line::default(),
      Line::from(vec![
        Span::styled("Source:   ", dim),
        Span::raw(item.source.clone()),
      ]),
      Line::from(vec![
        Span::styled("Category: ", dim),
        Span::styled(
          item.category.label(),
          Style::default().fg(category_color(item.category)),
        ),
      ]),
      Line::from(vec![
        Span::styled("Status:   ", dim),
        Span::styled(
          item.status.label(),
          Style::default().fg(status_color(item.status)),
        ),
        Span::raw(if item.is_favorite { "  ★ favorite" } else { "" }),
      ]),
      Line::from(vec![
        Span::styled("Added:    ", dim),
        Span::raw(timestamp(item.created_at)),
        Span::styled("  updated ", dim),
        Span::raw(timestamp(item.updated_at)),
      ]),
    ];
    if !item.link.is_empty() {
      lines.push(Line::from(vec![
        Span::styled("Link:     ", dim),
        Span::styled(item.link.clone(), Style::default().fg(Color::Cyan)),
      ]));
    }
    lines.push(Line::default());
    if item.summary.is_empty() {
      lines.push(Line::from(Span::styled("No summary", dim)));
    } else {
      lines.extend(item.summary.lines().map(|l| Line::from(l.to_string())));
    }
    lines
  }
}

impl View for NewsDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.item.id))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let paragraph = Paragraph::new(self.lines())
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    crate::ui::renderfns::truncate(&self.item.title, 30)
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll"),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
