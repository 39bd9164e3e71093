use crate::api::types::ProfileUser;
use crate::commands::CommandId;
use crate::config::Config;
use crate::error::AppResult;
use crate::event::{Event, EventHandler};
use crate::filters::FilterStore;
use crate::session::Session;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::views::{BoardView, ProfileView, PublicFeedView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::info;

const NOTICE_TTL: Duration = Duration::from_secs(6);

/// Main application state
pub struct App {
  title: String,
  session: Session,
  /// Board filters, shared with the board view so `:clear` can reach them
  filters: Arc<FilterStore>,

  /// Navigation stack, the board is always at index 0
  views: Vec<Box<dyn View>>,
  command: CommandInput,
  notice: Option<(Notice, Instant)>,
  profile_load: Option<oneshot::Receiver<AppResult<ProfileUser>>>,

  should_quit: bool,
}

impl App {
  /// Must be called inside the tokio runtime: the board starts fetching at once.
  pub fn new(config: &Config, session: Session) -> Self {
    let filters = Arc::new(FilterStore::new(config.board.initial_filters()));
    let board = BoardView::new(&session, Arc::clone(&filters));

    // Warm the profile cache so `:profile` opens populated
    let (tx, rx) = oneshot::channel();
    let coordinator = session.profile().clone();
    tokio::spawn(async move {
      let _ = tx.send(coordinator.load().await);
    });

    Self {
      title: config.display_title(),
      session,
      filters,
      views: vec![Box::new(board)],
      command: CommandInput::new(),
      notice: None,
      profile_load: Some(rx),
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    self.session.end();
    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
  ) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;
      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) | Some(Event::Resize) => {}
        None => break,
      }
      self.tick();
    }
    Ok(())
  }

  fn tick(&mut self) {
    if let Some(rx) = self.profile_load.as_mut() {
      match rx.try_recv() {
        Ok(Ok(user)) => {
          self.set_notice(Notice::info(format!("Signed in as {}", user.username)));
          self.profile_load = None;
        }
        Ok(Err(e)) => {
          self.set_notice(Notice::error(e.user_message()));
          self.profile_load = None;
        }
        Err(oneshot::error::TryRecvError::Empty) => {}
        Err(oneshot::error::TryRecvError::Closed) => self.profile_load = None,
      }
    }

    for view in self.views.iter_mut() {
      view.tick();
    }
    let notices: Vec<Notice> = self
      .views
      .iter_mut()
      .filter_map(|view| view.take_notice())
      .collect();
    for notice in notices {
      self.set_notice(notice);
    }

    if let Some((_, shown_at)) = &self.notice {
      if shown_at.elapsed() > NOTICE_TTL {
        self.notice = None;
      }
    }
  }

  fn set_notice(&mut self, notice: Notice) {
    self.notice = Some((notice, Instant::now()));
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_captures = self.views.last().is_some_and(|v| v.captures_input());
    if self.command.is_active() || !view_captures {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(id)) => return self.run_command(id),
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          return self.set_notice(Notice::error(format!("Unknown command: {}", input)));
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.views.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(next) => self.views.push(next),
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn run_command(&mut self, id: CommandId) {
    info!(command = ?id, "command");
    match id {
      CommandId::Board => self.views.truncate(1),
      CommandId::Profile => {
        self.views.truncate(1);
        self.views.push(Box::new(ProfileView::new(&self.session)));
      }
      CommandId::Public => {
        let page_size = self.filters.current().page_size;
        self.views.truncate(1);
        self.views.push(Box::new(PublicFeedView::new(&self.session, page_size)));
      }
      CommandId::Clear => {
        let notice = if self.filters.clear_filters() {
          "Filters cleared"
        } else {
          "No filters to clear"
        };
        self.set_notice(Notice::info(notice));
      }
      CommandId::Quit => self.should_quit = true,
    }
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.views.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref().map(|(notice, _)| notice)
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self.views.last().map(|v| v.shortcuts()).unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }
}
