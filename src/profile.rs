//! Profile mutations with optimistic cache writes.
//!
//! Each target (profile, password) moves through
//! `Idle → Optimistic|InFlight → Committed|RolledBack`. A second call while
//! one is pending is rejected with [`AppError::Busy`].

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::types::{PasswordChange, ProfilePatch, ProfileUser};
use crate::api::{NewsBackend, NewsQueryKey};
use crate::cache::{QueryClient, QueryKey};
use crate::error::{AppError, AppResult};
use crate::observer::{Listeners, Subscription};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationState {
  #[default]
  Idle,
  /// Optimistic value written to the cache, request pending
  Optimistic,
  /// Request pending, nothing written locally
  InFlight,
  Committed,
  RolledBack,
}

impl MutationState {
  fn is_pending(self) -> bool {
    matches!(self, MutationState::Optimistic | MutationState::InFlight)
  }
}

/// Outcome of a failed password change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
  #[error("current password is incorrect")]
  IncorrectCurrent,
  #[error("password rejected: {0}")]
  PolicyRejected(String),
  #[error("password change failed: {0}")]
  Failed(AppError),
}

impl PasswordError {
  fn from_backend(err: AppError) -> Self {
    match err {
      AppError::Auth(_) => PasswordError::IncorrectCurrent,
      // The backend answers a wrong current password with a plain 400
      AppError::Validation { message, .. } if is_wrong_current_password(&message) => {
        PasswordError::IncorrectCurrent
      }
      AppError::Validation { message, .. } => PasswordError::PolicyRejected(message),
      other => PasswordError::Failed(other),
    }
  }

  pub fn user_message(&self) -> String {
    match self {
      PasswordError::IncorrectCurrent => "Current password is incorrect.".to_string(),
      PasswordError::PolicyRejected(reason) => format!("New password not accepted: {}", reason),
      PasswordError::Failed(err) => format!("Could not change password. {}", err.user_message()),
    }
  }
}

fn is_wrong_current_password(message: &str) -> bool {
  let lower = message.to_lowercase();
  lower.contains("current password") && lower.contains("incorrect")
}

/// Lifecycle notifications for profile and password mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
  ProfileOptimistic(ProfileUser),
  ProfileCommitted(ProfileUser),
  ProfileRolledBack(AppError),
  PasswordChanged,
  PasswordRejected(PasswordError),
}

pub fn validate_username(username: &str) -> AppResult<()> {
  let len = username.chars().count();
  if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
    return Err(AppError::validation(
      Some("username"),
      format!(
        "must be between {} and {} characters",
        USERNAME_MIN, USERNAME_MAX
      ),
    ));
  }
  if !username
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '_')
  {
    return Err(AppError::validation(
      Some("username"),
      "may only contain letters, digits and underscores",
    ));
  }
  Ok(())
}

pub fn validate_email(email: &str) -> AppResult<()> {
  let invalid = || AppError::validation(Some("email"), "is not a valid email address");
  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  let domain_ok = domain.contains('.')
    && !domain.contains('@')
    && !domain.starts_with('.')
    && !domain.ends_with('.');
  if local.is_empty() || !domain_ok {
    return Err(invalid());
  }
  Ok(())
}

fn validate_patch(patch: &ProfilePatch) -> AppResult<()> {
  if patch.is_empty() {
    return Err(AppError::validation(None, "nothing to update"));
  }
  if let Some(username) = &patch.username {
    validate_username(username)?;
  }
  if let Some(email) = &patch.email {
    validate_email(email)?;
  }
  Ok(())
}

/// Client-side password rules, checked before any request.
fn check_password_policy(current: &str, new: &str, confirmation: &str) -> Result<(), String> {
  if current.is_empty() {
    return Err("enter your current password".to_string());
  }
  if new.chars().count() < PASSWORD_MIN {
    return Err(format!("must be at least {} characters", PASSWORD_MIN));
  }
  if new == current {
    return Err("must differ from the current password".to_string());
  }
  if new != confirmation {
    return Err("confirmation does not match".to_string());
  }
  Ok(())
}

type Rollback<'a> = Box<dyn FnOnce(AppError) + Send + 'a>;

/// Marks a target pending for as long as it lives.
///
/// Dropping it unsettled (the caller's future was cancelled) runs the
/// rollback and leaves the target `RolledBack`.
struct MutationGuard<'a> {
  state: &'a Mutex<MutationState>,
  rollback: Option<Rollback<'a>>,
  settled: bool,
}

impl<'a> MutationGuard<'a> {
  fn begin(
    state: &'a Mutex<MutationState>,
    target: &'static str,
    pending: MutationState,
  ) -> AppResult<Self> {
    let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
    if current.is_pending() {
      return Err(AppError::Busy(target));
    }
    *current = pending;
    Ok(Self {
      state,
      rollback: None,
      settled: false,
    })
  }

  fn arm(&mut self, rollback: impl FnOnce(AppError) + Send + 'a) {
    self.rollback = Some(Box::new(rollback));
  }

  fn settle(mut self, outcome: MutationState) {
    self.rollback = None;
    self.finish(outcome);
  }

  fn roll_back(mut self, err: AppError) {
    if let Some(rollback) = self.rollback.take() {
      rollback(err);
    }
    self.finish(MutationState::RolledBack);
  }

  fn finish(&mut self, outcome: MutationState) {
    *self.state.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    self.settled = true;
  }
}

impl Drop for MutationGuard<'_> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    warn!("mutation abandoned before the server answered");
    if let Some(rollback) = self.rollback.take() {
      rollback(AppError::State("update cancelled".to_string()));
    }
    self.finish(MutationState::RolledBack);
  }
}

/// Coordinates profile reads and writes against the shared profile cache.
#[derive(Clone)]
pub struct ProfileCoordinator {
  backend: Arc<dyn NewsBackend>,
  client: QueryClient<ProfileUser>,
  profile_state: Arc<Mutex<MutationState>>,
  password_state: Arc<Mutex<MutationState>>,
  listeners: Listeners<MutationEvent>,
}

impl ProfileCoordinator {
  pub fn new(backend: Arc<dyn NewsBackend>, client: QueryClient<ProfileUser>) -> Self {
    Self {
      backend,
      client,
      profile_state: Arc::new(Mutex::new(MutationState::Idle)),
      password_state: Arc::new(Mutex::new(MutationState::Idle)),
      listeners: Listeners::new(),
    }
  }

  /// Fetch the profile through the query client.
  pub async fn load(&self) -> AppResult<ProfileUser> {
    let backend = Arc::clone(&self.backend);
    self
      .client
      .fetch(&NewsQueryKey::Profile, move || {
        let backend = Arc::clone(&backend);
        async move { backend.get_profile().await }
      })
      .await
  }

  pub fn cached_profile(&self) -> Option<ProfileUser> {
    self.client.data(&NewsQueryKey::Profile)
  }

  pub fn profile_state(&self) -> MutationState {
    *self
      .profile_state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  pub fn password_state(&self) -> MutationState {
    *self
      .password_state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&MutationEvent) + Send + Sync + 'static,
  {
    self.listeners.subscribe(listener)
  }

  /// Apply `patch` optimistically, then confirm it with the server.
  ///
  /// On success the server's representation replaces the optimistic value
  /// and the entry is marked for revalidation. On failure the previous
  /// value is restored.
  pub async fn update_profile(&self, patch: ProfilePatch) -> AppResult<ProfileUser> {
    validate_patch(&patch)?;
    let mut mutation = MutationGuard::begin(&self.profile_state, "profile", MutationState::Optimistic)?;

    let cache = Arc::clone(self.client.cache());
    let hash = NewsQueryKey::Profile.cache_hash();
    let Some(snapshot) = cache.data(&hash) else {
      mutation.settle(MutationState::Idle);
      return Err(AppError::State("profile is not loaded".to_string()));
    };

    let optimistic = snapshot.apply(&patch);
    cache.set_data(&hash, Some(optimistic.clone()));
    {
      let cache = Arc::clone(&cache);
      let hash = hash.clone();
      let listeners = self.listeners.clone();
      let written = optimistic.clone();
      mutation.arm(move |err| {
        // A refetch that landed meanwhile holds newer server data
        if !cache.replace_data_if(&hash, &written, Some(snapshot)) {
          info!("profile changed during update, keeping cached value");
        }
        listeners.notify(&MutationEvent::ProfileRolledBack(err));
      });
    }
    self
      .listeners
      .notify(&MutationEvent::ProfileOptimistic(optimistic));

    match self.backend.update_profile(&patch).await {
      Ok(server) => {
        cache.commit_success(&hash, server.clone());
        mutation.settle(MutationState::Committed);
        info!(user = %server.username, "profile updated");
        self
          .listeners
          .notify(&MutationEvent::ProfileCommitted(server.clone()));
        cache.invalidate(&hash);
        Ok(server)
      }
      Err(e) => {
        warn!(error = %e, "profile update rejected, rolling back");
        mutation.roll_back(e.clone());
        Err(e)
      }
    }
  }

  /// Change the password. Nothing is sent if the client-side rules fail.
  pub async fn change_password(
    &self,
    current: &str,
    new: &str,
    confirmation: &str,
  ) -> Result<(), PasswordError> {
    if let Err(reason) = check_password_policy(current, new, confirmation) {
      let err = PasswordError::PolicyRejected(reason);
      self
        .listeners
        .notify(&MutationEvent::PasswordRejected(err.clone()));
      return Err(err);
    }

    let mutation = MutationGuard::begin(&self.password_state, "password", MutationState::InFlight)
      .map_err(PasswordError::Failed)?;

    let change = PasswordChange {
      current_password: current.to_string(),
      new_password: new.to_string(),
    };
    match self.backend.change_password(&change).await {
      Ok(()) => {
        mutation.settle(MutationState::Committed);
        info!("password changed");
        self.listeners.notify(&MutationEvent::PasswordChanged);
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "password change rejected");
        let err = PasswordError::from_backend(e);
        mutation.settle(MutationState::RolledBack);
        self
          .listeners
          .notify(&MutationEvent::PasswordRejected(err.clone()));
        Err(err)
      }
    }
  }
}
