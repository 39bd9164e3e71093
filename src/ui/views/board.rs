use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tokio::sync::mpsc;

use super::detail::NewsDetailView;
use crate::api::types::{NewsCategory, NewsDraft, NewsItem, NewsPage, NewsStats, NewsStatus};
use crate::api::NewsQueryKey;
use crate::error::AppResult;
use crate::filters::{FilterPredicate, FilterStore};
use crate::grouping::group_by_status;
use crate::news::NewsActions;
use crate::observer::Subscription;
use crate::query::{QueryState, QuerySync};
use crate::session::Session;
use crate::ui::components::{
  draw_filter_bar, Form, FormEvent, KeyResult, StatusPicker, StatusPickerEvent,
};
use crate::ui::renderfns::{category_color, status_color, truncate};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};

/// Finished background mutations, drained on tick
enum Outcome {
  Favorite(AppResult<NewsItem>),
  Moved(AppResult<NewsItem>),
  Created(AppResult<NewsItem>),
}

/// Build a draft from the add form: title, link, summary, source, category, public.
fn draft_from_form(values: Vec<String>) -> Result<NewsDraft, String> {
  let [title, link, summary, source, category, public] =
    <[String; 6]>::try_from(values).unwrap_or_default();
  let category = match category.trim() {
    "" => NewsCategory::General,
    name => name.parse::<NewsCategory>()?,
  };
  let is_public = match public.trim().to_lowercase().as_str() {
    "" | "n" | "no" => false,
    "y" | "yes" => true,
    other => return Err(format!("public must be y or n, got '{}'", other)),
  };
  Ok(NewsDraft {
    source: source.trim().to_string(),
    title: title.trim().to_string(),
    summary: summary.trim().to_string(),
    link: link.trim().to_string(),
    image_url: None,
    category,
    is_public,
  })
}

/// Kanban board of the user's news, one column per reading status
pub struct BoardView {
  filters: Arc<FilterStore>,
  actions: NewsActions,
  query: QuerySync<NewsQueryKey, NewsPage>,
  stats: QuerySync<NewsQueryKey, NewsStats>,
  _filter_subscription: Subscription,

  column: usize,
  row: usize,
  picker: StatusPicker,
  form: Option<Form>,

  outcome_tx: mpsc::UnboundedSender<Outcome>,
  outcome_rx: mpsc::UnboundedReceiver<Outcome>,
  notice: Option<Notice>,
}

impl BoardView {
  pub fn new(session: &Session, filters: Arc<FilterStore>) -> Self {
    let query = session.news_query();
    let handle = query.handle();
    let subscription = filters.subscribe(move |predicate: &FilterPredicate| {
      handle.sync(NewsQueryKey::NewsPage(predicate.clone()));
    });
    query.sync(NewsQueryKey::NewsPage(filters.current()));

    let stats = session.stats_query();
    stats.sync(NewsQueryKey::Stats);

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    Self {
      filters,
      actions: session.actions().clone(),
      query,
      stats,
      _filter_subscription: subscription,
      column: 0,
      row: 0,
      picker: StatusPicker::new(),
      form: None,
      outcome_tx,
      outcome_rx,
      notice: None,
    }
  }

  fn page(&self) -> Option<NewsPage> {
    self.query.snapshot().data().cloned()
  }

  fn column_status(&self) -> NewsStatus {
    NewsStatus::ALL[self.column % NewsStatus::ALL.len()]
  }

  fn selected_item(&self) -> Option<NewsItem> {
    let page = self.page()?;
    let columns = group_by_status(&page.items);
    columns
      .get(&self.column_status())
      .and_then(|items| items.get(self.row))
      .map(|item| (*item).clone())
  }

  fn column_len(&self) -> usize {
    let Some(page) = self.page() else {
      return 0;
    };
    group_by_status(&page.items)
      .get(&self.column_status())
      .map_or(0, Vec::len)
  }

  fn has_next_page(&self) -> bool {
    let Some(page) = self.page() else {
      return false;
    };
    let current = self.filters.current();
    u64::from(current.page) * u64::from(current.page_size) < page.total
  }

  fn move_row(&mut self, down: bool) {
    let len = self.column_len();
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

  fn move_column(&mut self, right: bool) {
    let count = NewsStatus::ALL.len();
    self.column = if right {
      (self.column + 1) % count
    } else {
      self.column.checked_sub(1).unwrap_or(count - 1)
    };
    self.row = 0;
  }

  /// Apply a filter helper; the store notifies the query on change
  fn change_filters(&mut self, changed: bool) {
    if changed {
      self.row = 0;
    }
  }

  fn toggle_favorite(&mut self) {
    let Some(item) = self.selected_item() else {
      return;
    };
    let actions = self.actions.clone();
    let tx = self.outcome_tx.clone();
    tokio::spawn(async move {
      let result = actions.toggle_favorite(&item.id).await;
      let _ = tx.send(Outcome::Favorite(result));
    });
  }

  fn move_item(&mut self, id: String, status: NewsStatus) {
    let actions = self.actions.clone();
    let tx = self.outcome_tx.clone();
    tokio::spawn(async move {
      let result = actions.set_status(&id, status).await;
      let _ = tx.send(Outcome::Moved(result));
    });
  }

  fn open_add_form(&mut self) {
    let category = self
      .filters
      .current()
      .category
      .unwrap_or(NewsCategory::General);
    let form = Form::new("Add news")
      .field("Title", "")
      .field("Link", "")
      .field("Summary", "")
      .field("Source", "")
      .field("Category", category.as_str())
      .field("Public (y/n)", "n");
    self.form = Some(form);
  }

  fn submit_add_form(&mut self, values: Vec<String>) {
    let draft = match draft_from_form(values) {
      Ok(draft) => draft,
      Err(reason) => {
        self.notice = Some(Notice::error(reason));
        return;
      }
    };
    let actions = self.actions.clone();
    let tx = self.outcome_tx.clone();
    tokio::spawn(async move {
      let _ = tx.send(Outcome::Created(actions.create_news(draft).await));
    });
  }

  fn outcome_notice(outcome: Outcome) -> Notice {
    match outcome {
      Outcome::Favorite(Ok(item)) if item.is_favorite => {
        Notice::info(format!("★ {}", truncate(&item.title, 40)))
      }
      Outcome::Favorite(Ok(item)) => {
        Notice::info(format!("Unstarred {}", truncate(&item.title, 40)))
      }
      Outcome::Moved(Ok(item)) => Notice::info(format!(
        "Moved to {}: {}",
        item.status.label(),
        truncate(&item.title, 40)
      )),
      Outcome::Created(Ok(item)) => Notice::info(format!("Added {}", truncate(&item.title, 40))),
      Outcome::Favorite(Err(e)) | Outcome::Moved(Err(e)) | Outcome::Created(Err(e)) => {
        Notice::error(e.user_message())
      }
    }
  }

  fn card(item: &NewsItem, width: usize) -> ListItem<'static> {
    let star = if item.is_favorite { "★ " } else { "  " };
    let title = Line::from(vec![
      Span::styled(star, Style::default().fg(Color::Yellow)),
      Span::raw(truncate(&item.title, width.saturating_sub(2))),
    ]);
    let meta = Line::from(vec![
      Span::raw("  "),
      Span::styled(
        item.category.label(),
        Style::default().fg(category_color(item.category)),
      ),
      Span::styled(
        format!(" · {}", truncate(&item.source, width.saturating_sub(14))),
        Style::default().fg(Color::DarkGray),
      ),
    ]);
    ListItem::new(vec![title, meta])
  }

  fn render_columns(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.query.snapshot();
    let stats = self.stats.snapshot().data().copied();

    let Some(page) = snapshot.data() else {
      let (text, color) = match &snapshot {
        QueryState::Error { error, .. } => (
          format!("{}\n\nPress 'r' to retry.", error.user_message()),
          Color::Red,
        ),
        _ => ("Loading news...".to_string(), Color::DarkGray),
      };
      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
      let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color));
      frame.render_widget(paragraph, area);
      return;
    };

    let columns = group_by_status(&page.items);
    let col_areas = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);

    for (idx, status) in NewsStatus::ALL.iter().enumerate() {
      let items = columns.get(status).map(Vec::as_slice).unwrap_or(&[]);
      let selected = idx == self.column;
      let col_area = col_areas[idx];

      let mut title = format!(" {} ({}", status.label(), items.len());
      if let Some(stats) = stats {
        title.push_str(&format!("/{}", stats.count_for(*status)));
      }
      title.push_str(") ");
      if selected && snapshot.is_loading() {
        title.push_str("⟳ ");
      }

      let block = Block::default()
        .title(Span::styled(title, Style::default().fg(status_color(*status))))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if selected { Color::Yellow } else { Color::Blue }));

      let width = col_area.width.saturating_sub(5) as usize;
      let cards: Vec<ListItem> = items.iter().map(|item| Self::card(item, width)).collect();
      let list = List::new(cards)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

      if selected {
        if !items.is_empty() {
          self.row = self.row.min(items.len() - 1);
        }
        let mut state = ListState::default();
        state.select((!items.is_empty()).then_some(self.row));
        frame.render_stateful_widget(list, col_area, &mut state);
      } else {
        frame.render_widget(list, col_area);
      }
    }
  }
}

impl View for BoardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          self.form = None;
          self.submit_add_form(values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(StatusPickerEvent::Selected { id, status }) => {
        self.move_item(id, status);
        return ViewAction::None;
      }
      KeyResult::Event(StatusPickerEvent::Cancelled) | KeyResult::Handled => {
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_row(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_row(false),
      KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.move_column(true),
      KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.move_column(false),

      KeyCode::Char('c') => {
        let changed = self.filters.cycle_category();
        self.change_filters(changed);
      }
      KeyCode::Char('v') => {
        let changed = self.filters.toggle_favorites_only();
        self.change_filters(changed);
      }
      KeyCode::Char('s') => {
        let changed = self.filters.cycle_status();
        self.change_filters(changed);
      }
      KeyCode::Char('x') => {
        let changed = self.filters.clear_filters();
        self.change_filters(changed);
      }
      KeyCode::Char('n') => {
        if self.has_next_page() {
          let changed = self.filters.next_page();
          self.change_filters(changed);
        } else {
          self.notice = Some(Notice::info("Already on the last page"));
        }
      }
      KeyCode::Char('p') => {
        let changed = self.filters.prev_page();
        self.change_filters(changed);
      }

      KeyCode::Char(' ') => self.toggle_favorite(),
      KeyCode::Char('a') => self.open_add_form(),
      KeyCode::Char('m') => {
        if let Some(item) = self.selected_item() {
          let title = format!("Move {}", truncate(&item.title, 24));
          self.picker.show(item.id, title, item.status);
        }
      }
      KeyCode::Char('r') => {
        self.query.refetch();
        self.stats.refetch();
      }
      KeyCode::Enter => {
        if let Some(item) = self.selected_item() {
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
    let total = self.page().map(|p| p.total);
    draw_filter_bar(frame, chunks[0], &self.filters.current(), total);
    self.render_columns(frame, chunks[1]);
    self.picker.render_overlay(frame, area);
    if let Some(form) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Board".to_string()
  }

  fn tick(&mut self) {
    while let Ok(outcome) = self.outcome_rx.try_recv() {
      self.notice = Some(Self::outcome_notice(outcome));
    }
  }

  fn take_notice(&mut self) -> Option<Notice> {
    self.notice.take()
  }

  fn captures_input(&self) -> bool {
    self.picker.is_active() || self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.form.is_some() {
      return vec![
        ShortcutInfo::new("Tab", "next field"),
        ShortcutInfo::new("Enter", "next/save"),
        ShortcutInfo::new("Esc", "cancel"),
      ];
    }
    if self.picker.is_active() {
      return vec![
        ShortcutInfo::new("j/k", "choose"),
        ShortcutInfo::new("Enter", "move"),
        ShortcutInfo::new("Esc", "cancel"),
      ];
    }
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("space", "star").with_priority(20),
      ShortcutInfo::new("m", "move").with_priority(21),
      ShortcutInfo::new("a", "add").with_priority(22),
      ShortcutInfo::new("x", "clear filters").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("Enter", "open").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::{news_item, FakeBackend};
  use crate::api::types::NewsCategory;
  use crate::config::CacheConfig;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  fn press(view: &mut BoardView, c: char) -> ViewAction {
    view.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  fn board() -> (Arc<FakeBackend>, Session, Arc<FilterStore>) {
    let backend = Arc::new(FakeBackend::with_news(vec![
      news_item("g1", NewsCategory::General, NewsStatus::Pending, false),
      news_item("r1", NewsCategory::Research, NewsStatus::Reading, true),
    ]));
    let session = Session::start(backend.clone(), &CacheConfig::default());
    (backend, session, Arc::new(FilterStore::default()))
  }

  #[tokio::test]
  async fn test_category_key_refetches_with_new_filter() {
    let (backend, session, filters) = board();
    let mut view = BoardView::new(&session, Arc::clone(&filters));
    settle().await;
    assert_eq!(backend.calls("list_news"), 1);

    press(&mut view, 'c');
    settle().await;

    assert_eq!(filters.current().category, Some(NewsCategory::General));
    assert_eq!(backend.calls("list_news"), 2);
    let page = view.page().unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "g1");
  }

  #[tokio::test]
  async fn test_space_toggles_favorite_and_reports() {
    let (backend, session, filters) = board();
    let mut view = BoardView::new(&session, filters);
    settle().await;

    // First column (Pending) holds g1
    press(&mut view, ' ');
    settle().await;
    view.tick();

    let notice = view.take_notice().unwrap();
    assert!(notice.text.starts_with('★'));
    assert!(backend.news.lock().unwrap()[0].is_favorite);
    // Board and counters were invalidated and refetched
    assert_eq!(backend.calls("list_news"), 2);
    assert_eq!(backend.calls("news_stats"), 2);
  }

  #[tokio::test]
  async fn test_status_picker_moves_card() {
    let (backend, session, filters) = board();
    let mut view = BoardView::new(&session, filters);
    settle().await;

    press(&mut view, 'm');
    assert!(view.captures_input());
    view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    settle().await;
    view.tick();

    assert_eq!(backend.news.lock().unwrap()[0].status, NewsStatus::Reading);
    let notice = view.take_notice().unwrap();
    assert!(notice.text.starts_with("Moved to Reading"));
  }

  #[tokio::test]
  async fn test_next_page_stops_at_last_page() {
    let (_backend, session, filters) = board();
    let mut view = BoardView::new(&session, Arc::clone(&filters));
    settle().await;

    press(&mut view, 'n');
    assert_eq!(filters.current().page, 1);
    assert!(view.take_notice().is_some());
  }

  #[tokio::test]
  async fn test_dropped_board_stops_following_filters() {
    let (backend, session, filters) = board();
    let view = BoardView::new(&session, Arc::clone(&filters));
    settle().await;
    drop(view);

    filters.cycle_category();
    settle().await;
    assert_eq!(backend.calls("list_news"), 1);
  }

  fn type_line(view: &mut BoardView, text: &str) {
    for c in text.chars() {
      press(view, c);
    }
    view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
  }

  #[tokio::test]
  async fn test_add_form_creates_item_on_board() {
    let (backend, session, filters) = board();
    let mut view = BoardView::new(&session, filters);
    settle().await;

    press(&mut view, 'a');
    assert!(view.captures_input());
    type_line(&mut view, "Rust 2024");
    type_line(&mut view, "https://example.com/rust");
    type_line(&mut view, "Edition notes");
    type_line(&mut view, "Blog");
    type_line(&mut view, "");
    view.handle_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
    type_line(&mut view, "y");
    assert!(!view.captures_input());
    settle().await;
    view.tick();

    assert_eq!(view.take_notice(), Some(Notice::info("Added Rust 2024")));
    let created = backend.news.lock().unwrap().last().cloned().unwrap();
    assert_eq!(created.category, NewsCategory::General);
    assert!(created.is_public);
    assert_eq!(backend.calls("list_news"), 2);
    assert!(view
      .page()
      .unwrap()
      .items
      .iter()
      .any(|i| i.title == "Rust 2024"));
  }

  #[tokio::test]
  async fn test_add_form_rejects_bad_category_locally() {
    let (backend, session, filters) = board();
    let mut view = BoardView::new(&session, filters);
    settle().await;

    press(&mut view, 'a');
    for value in ["T", "https://example.com/t", "S", "Src"] {
      type_line(&mut view, value);
    }
    for _ in 0.."general".len() {
      view.handle_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
    }
    type_line(&mut view, "sports");
    type_line(&mut view, "");
    settle().await;

    let notice = view.take_notice().unwrap();
    assert!(notice.text.contains("unknown category"));
    assert_eq!(backend.calls("create_news"), 0);
  }
}
