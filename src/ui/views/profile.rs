use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::sync::mpsc;

use crate::api::types::{NewsStats, NewsStatus, ProfilePatch, ProfileUser};
use crate::api::NewsQueryKey;
use crate::error::AppResult;
use crate::news::NewsActions;
use crate::observer::Subscription;
use crate::profile::{MutationEvent, MutationState, PasswordError, ProfileCoordinator};
use crate::query::{QueryState, QuerySync};
use crate::session::Session;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};

enum Outcome {
  Saving,
  Profile(AppResult<ProfileUser>),
  Password(Result<(), PasswordError>),
  Stats(AppResult<NewsStats>),
}

enum FormKind {
  Edit,
  Password,
}

/// Account details with edit and password forms
pub struct ProfileView {
  coordinator: ProfileCoordinator,
  actions: NewsActions,
  query: QuerySync<NewsQueryKey, ProfileUser>,
  _mutations: Subscription,
  stats: Option<NewsStats>,
  form: Option<(FormKind, Form)>,

  outcome_tx: mpsc::UnboundedSender<Outcome>,
  outcome_rx: mpsc::UnboundedReceiver<Outcome>,
  notice: Option<Notice>,
}

impl ProfileView {
  pub fn new(session: &Session) -> Self {
    let query = session.profile_query();
    query.sync(NewsQueryKey::Profile);

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let coordinator = session.profile().clone();
    let tx = outcome_tx.clone();
    let mutations = coordinator.subscribe(move |event| {
      if let MutationEvent::ProfileOptimistic(_) = event {
        let _ = tx.send(Outcome::Saving);
      }
    });

    let view = Self {
      coordinator,
      actions: session.actions().clone(),
      query,
      _mutations: mutations,
      stats: None,
      form: None,
      outcome_tx,
      outcome_rx,
      notice: None,
    };
    view.load_stats();
    view
  }

  fn load_stats(&self) {
    let actions = self.actions.clone();
    let tx = self.outcome_tx.clone();
    tokio::spawn(async move {
      let _ = tx.send(Outcome::Stats(actions.stats().await));
    });
  }

  fn open_edit(&mut self) {
    let Some(profile) = self.query.snapshot().data().cloned() else {
      self.notice = Some(Notice::error("Profile is still loading"));
      return;
    };
    let form = Form::new("Edit profile")
      .field("Username", &profile.username)
      .field("Email", &profile.email);
    self.form = Some((FormKind::Edit, form));
  }

  fn open_password(&mut self) {
    let form = Form::new("Change password")
      .secret("Current password")
      .secret("New password")
      .secret("Confirm password");
    self.form = Some((FormKind::Password, form));
  }

  fn submit(&mut self, kind: FormKind, values: Vec<String>) {
    match kind {
      FormKind::Edit => {
        let [username, email] = <[String; 2]>::try_from(values).unwrap_or_default();
        let Some(current) = self.query.snapshot().data().cloned() else {
          return;
        };
        let patch = changed_fields(&current, username.trim(), email.trim());
        if patch.is_empty() {
          self.notice = Some(Notice::info("Nothing changed"));
          return;
        }
        let coordinator = self.coordinator.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
          let _ = tx.send(Outcome::Profile(coordinator.update_profile(patch).await));
        });
      }
      FormKind::Password => {
        let [current, new, confirm] = <[String; 3]>::try_from(values).unwrap_or_default();
        let coordinator = self.coordinator.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
          let result = coordinator.change_password(&current, &new, &confirm).await;
          let _ = tx.send(Outcome::Password(result));
        });
      }
    }
  }

  fn apply_outcome(&mut self, outcome: Outcome) {
    let notice = match outcome {
      Outcome::Saving => Notice::info("Saving profile..."),
      Outcome::Profile(Ok(user)) => Notice::info(format!("Profile saved as {}", user.username)),
      Outcome::Profile(Err(e)) => Notice::error(e.user_message()),
      Outcome::Password(Ok(())) => Notice::info("Password changed"),
      Outcome::Password(Err(e)) => Notice::error(e.user_message()),
      Outcome::Stats(Ok(stats)) => {
        self.stats = Some(stats);
        return;
      }
      Outcome::Stats(Err(e)) => Notice::error(format!("Stats unavailable. {}", e.user_message())),
    };
    self.notice = Some(notice);
  }

  fn profile_lines(&self, profile: &ProfileUser) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let date = |ts: Option<chrono::DateTime<chrono::Utc>>| {
      ts.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
    };
    let row = |label: &'static str, value: String| {
      Line::from(vec![Span::styled(format!("{:<14}", label), dim), Span::raw(value)])
    };

    let mut lines = vec![
      row("Username", profile.username.clone()),
      row("Email", profile.email.clone()),
      row("Account", profile.account_status().to_string()),
      row("Member since", date(profile.created_at)),
      row("Last updated", date(profile.updated_at)),
      Line::default(),
    ];

    match self.stats {
      Some(stats) => {
        lines.push(Line::from(Span::styled("Reading", Style::default().bold())));
        for status in NewsStatus::ALL {
          lines.push(row(status.label(), stats.count_for(status).to_string()));
        }
        lines.push(row("Favorites", stats.favorite_count.to_string()));
        lines.push(row("Total", stats.total_count.to_string()));
      }
      None => lines.push(Line::from(Span::styled("Loading stats...", dim))),
    }
    lines
  }
}

/// Only the fields that differ from the current profile
fn changed_fields(current: &ProfileUser, username: &str, email: &str) -> ProfilePatch {
  ProfilePatch {
    username: (username != current.username).then(|| username.to_string()),
    email: (email != current.email).then(|| email.to_string()),
  }
}

impl View for ProfileView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some((_, form)) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          if let Some((kind, _)) = self.form.take() {
            self.submit(kind, values);
          }
        }
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('e') => self.open_edit(),
      KeyCode::Char('P') => self.open_password(),
      KeyCode::Char('r') => {
        self.query.refetch();
        self.load_stats();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.coordinator.profile_state() {
      MutationState::Optimistic => " Profile (saving...) ",
      _ => " Profile ",
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = match self.query.snapshot() {
      QueryState::Success(profile)
      | QueryState::Loading {
        previous: Some(profile),
      }
      | QueryState::Error {
        previous: Some(profile),
        ..
      } => Paragraph::new(self.profile_lines(&profile)),
      QueryState::Error { error, .. } => Paragraph::new(format!(
        "{}\n\nPress 'r' to retry.",
        error.user_message()
      ))
      .style(Style::default().fg(Color::Red)),
      _ => Paragraph::new("Loading profile...").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), area);

    if let Some((_, form)) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Profile".to_string()
  }

  fn tick(&mut self) {
    while let Ok(outcome) = self.outcome_rx.try_recv() {
      self.apply_outcome(outcome);
    }
  }

  fn take_notice(&mut self) -> Option<Notice> {
    self.notice.take()
  }

  fn captures_input(&self) -> bool {
    self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.form.is_some() {
      return vec![
        ShortcutInfo::new("Tab", "next field"),
        ShortcutInfo::new("Enter", "submit"),
        ShortcutInfo::new("Esc", "cancel"),
      ];
    }
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("e", "edit").with_priority(20),
      ShortcutInfo::new("P", "password").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
