use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use super::detail::NewsDetailView;
use crate::api::types::{NewsItem, NewsPage};
use crate::api::NewsQueryKey;
use crate::filters::{FilterPredicate, FilterStore};
use crate::observer::Subscription;
use crate::query::{QueryState, QuerySync};
use crate::session::Session;
use crate::ui::renderfns::{category_color, truncate};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};

/// Items other users have shared, newest first as the server sends them
pub struct PublicFeedView {
  filters: FilterStore,
  query: QuerySync<NewsQueryKey, NewsPage>,
  _filter_subscription: Subscription,
  row: usize,
  notice: Option<Notice>,
}

impl PublicFeedView {
  pub fn new(session: &Session, page_size: u32) -> Self {
    let filters = FilterStore::new(FilterPredicate::with_page_size(page_size));
    let query = session.public_query();
    let handle = query.handle();
    let subscription = filters.subscribe(move |predicate: &FilterPredicate| {
      handle.sync(NewsQueryKey::PublicPage(predicate.clone()));
    });
    query.sync(NewsQueryKey::PublicPage(filters.current()));

    Self {
      filters,
      query,
      _filter_subscription: subscription,
      row: 0,
      notice: None,
    }
  }

  fn page(&self) -> Option<NewsPage> {
    self.query.snapshot().data().cloned()
  }

  fn pages(&self) -> Option<u64> {
    let page = self.page()?;
    let size = u64::from(self.filters.current().page_size);
    Some(page.total.div_ceil(size).max(1))
  }

  fn move_row(&mut self, down: bool) {
    let len = self.page().map_or(0, |p| p.items.len());
    if len == 0 {
      self.row = 0;
      return;
    }
    self.row = if down {
      (self.row + 1) % len
    } else {
      self.row.checked_sub(1).unwrap_or(len - 1)
    };
  }

  fn header_line(&self) -> Line<'static> {
    let current = self.filters.current();
    let key = Style::default().fg(Color::Cyan);
    let category = match current.category {
      Some(c) => Span::styled(
        format!(" {} ", c.label()),
        Style::default().fg(Color::Black).bg(Color::Cyan),
      ),
      None => Span::styled(" any ", Style::default().fg(Color::Gray)),
    };
    let page = match self.pages() {
      Some(pages) => format!("page {}/{}", current.page, pages),
      None => format!("page {}", current.page),
    };
    Line::from(vec![
      Span::raw(" "),
      Span::styled("<c>", key),
      Span::styled(" category ", Style::default().fg(Color::DarkGray)),
      category,
      Span::raw("  "),
      Span::styled("<n/p> ", key),
      Span::raw(page),
    ])
  }

  fn row_item(item: &NewsItem, width: usize) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
      Span::styled(
        format!("{:<9}", item.category.label()),
        Style::default().fg(category_color(item.category)),
      ),
      Span::raw(truncate(&item.title, width.saturating_sub(26))),
      Span::styled(
        format!("  {}", truncate(&item.source, 14)),
        Style::default().fg(Color::DarkGray),
      ),
    ]))
  }
}

impl View for PublicFeedView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_row(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_row(false),
      KeyCode::Char('c') => {
        if self.filters.cycle_category() {
          self.row = 0;
        }
      }
      KeyCode::Char('n') => {
        let on_last = self
          .pages()
          .map_or(true, |pages| u64::from(self.filters.current().page) >= pages);
        if on_last {
          self.notice = Some(Notice::info("Already on the last page"));
        } else if self.filters.next_page() {
          self.row = 0;
        }
      }
      KeyCode::Char('p') => {
        if self.filters.prev_page() {
          self.row = 0;
        }
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => {
        let item = self.page().and_then(|p| p.items.get(self.row).cloned());
        if let Some(item) = item {
          return ViewAction::Push(Box::new(NewsDetailView::new(item)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(area);
    frame.render_widget(Paragraph::new(self.header_line()), chunks[0]);

    let snapshot = self.query.snapshot();
    let mut title = " Public feed ".to_string();
    if snapshot.is_loading() {
      title.push_str("⟳ ");
    }
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(page) = snapshot.data() else {
      let (text, color) = match &snapshot {
        QueryState::Error { error, .. } => (
          format!("{}\n\nPress 'r' to retry.", error.user_message()),
          Color::Red,
        ),
        _ => ("Loading public news...".to_string(), Color::DarkGray),
      };
      let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color));
      frame.render_widget(paragraph, chunks[1]);
      return;
    };

    if page.items.is_empty() {
      let paragraph = Paragraph::new("Nothing shared yet.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[1]);
      return;
    }

    let width = chunks[1].width.saturating_sub(4) as usize;
    let rows: Vec<ListItem> = page.items.iter().map(|i| Self::row_item(i, width)).collect();
    self.row = self.row.min(page.items.len() - 1);
    let list = List::new(rows)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(self.row));
    frame.render_stateful_widget(list, chunks[1], &mut state);
  }

  fn breadcrumb_label(&self) -> String {
    "Public".to_string()
  }

  fn take_notice(&mut self) -> Option<Notice> {
    self.notice.take()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("c", "category").with_priority(20),
      ShortcutInfo::new("n/p", "page").with_priority(21),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("Enter", "open").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::{news_item, FakeBackend};
  use crate::api::types::{NewsCategory, NewsStatus};
  use crate::config::CacheConfig;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;
  use std::time::Duration;

  fn press(view: &mut PublicFeedView, code: KeyCode) -> ViewAction {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  fn feed() -> (Arc<FakeBackend>, Session) {
    let mut items = vec![
      news_item("g1", NewsCategory::General, NewsStatus::Pending, false),
      news_item("r1", NewsCategory::Research, NewsStatus::Read, false),
      news_item("r2", NewsCategory::Research, NewsStatus::Pending, false),
      news_item("hidden", NewsCategory::Research, NewsStatus::Pending, false),
    ];
    for item in items.iter_mut() {
      item.is_public = item.id != "hidden";
    }
    let backend = Arc::new(FakeBackend::with_news(items));
    let session = Session::start(backend.clone(), &CacheConfig::default());
    (backend, session)
  }

  fn ids(view: &PublicFeedView) -> Vec<String> {
    view
      .page()
      .map(|p| p.items.into_iter().map(|i| i.id).collect())
      .unwrap_or_default()
  }

  #[tokio::test]
  async fn test_lists_only_public_items() {
    let (backend, session) = feed();
    let view = PublicFeedView::new(&session, 20);
    settle().await;

    assert_eq!(ids(&view), vec!["g1", "r1", "r2"]);
    assert_eq!(backend.calls("list_public_news"), 1);
    assert_eq!(backend.calls("list_news"), 0);
  }

  #[tokio::test]
  async fn test_category_and_paging() {
    let (backend, session) = feed();
    let mut view = PublicFeedView::new(&session, 1);
    settle().await;
    assert_eq!(view.pages(), Some(3));

    press(&mut view, KeyCode::Char('n'));
    settle().await;
    assert_eq!(ids(&view), vec!["r1"]);

    // Category change starts over on page one
    press(&mut view, KeyCode::Char('c'));
    settle().await;
    assert_eq!(view.filters.current().page, 1);
    assert_eq!(ids(&view), vec!["g1"]);
    press(&mut view, KeyCode::Char('n'));
    assert_eq!(view.take_notice(), Some(Notice::info("Already on the last page")));
    assert_eq!(backend.calls("list_public_news"), 3);
  }

  #[tokio::test]
  async fn test_enter_opens_detail_and_q_pops() {
    let (_backend, session) = feed();
    let mut view = PublicFeedView::new(&session, 20);
    settle().await;

    press(&mut view, KeyCode::Char('j'));
    match press(&mut view, KeyCode::Enter) {
      ViewAction::Push(detail) => assert_eq!(detail.breadcrumb_label(), "Story r1"),
      _ => panic!("expected detail view"),
    }
    assert!(matches!(press(&mut view, KeyCode::Char('q')), ViewAction::Pop));
  }
}
