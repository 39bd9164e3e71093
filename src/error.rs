//! Error taxonomy for the data layer.
//!
//! Everything below the UI reports failures as an [`AppError`]. The enum is
//! `Clone` because a single deduplicated request hands the same outcome to
//! every caller attached to it.

use thiserror::Error;

/// Failures surfaced by the synchronizer, the mutation coordinators and the API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
  /// Transport failure or 5xx response. The only kind reads retry on.
  #[error("network error: {0}")]
  Network(String),

  /// Input rejected, either locally or by the backend (400/422).
  #[error("{message}")]
  Validation {
    field: Option<String>,
    message: String,
  },

  /// Session missing, expired or forbidden (401/403).
  #[error("not authorized: {0}")]
  Auth(String),

  /// Username or email already taken (409, or a uniqueness rejection).
  #[error("conflict: {0}")]
  Conflict(String),

  /// The backend has no such resource (404).
  #[error("not found: {0}")]
  NotFound(String),

  /// Operation invoked against missing or inconsistent local state.
  #[error("invalid local state: {0}")]
  State(String),

  /// A mutation for the same target is still in flight.
  #[error("{0} update already in progress")]
  Busy(&'static str),

  /// Response body did not match the expected shape.
  #[error("unexpected response: {0}")]
  Decode(String),
}

/// Result alias for the data layer.
pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
  pub fn validation(field: Option<&str>, message: impl Into<String>) -> Self {
    AppError::Validation {
      field: field.map(String::from),
      message: message.into(),
    }
  }

  /// Whether a read may be retried after this error.
  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::Network(_))
  }

  /// Text for the status line.
  pub fn user_message(&self) -> String {
    match self {
      AppError::Network(_) => "Could not reach the server. Try again in a moment.".to_string(),
      AppError::Validation {
        field: Some(field),
        message,
      } => format!("{}: {}", field, message),
      AppError::Validation {
        field: None,
        message,
      } => message.clone(),
      AppError::Auth(_) => "Your session has expired. Please sign in again.".to_string(),
      AppError::Conflict(msg) => msg.clone(),
      AppError::NotFound(what) => format!("Not found: {}", what),
      AppError::State(msg) => format!("Cannot do that right now: {}", msg),
      AppError::Busy(target) => format!("The {} update is still being saved.", target),
      AppError::Decode(_) => "The server sent a response we could not read.".to_string(),
    }
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      AppError::Decode(err.to_string())
    } else {
      AppError::Network(err.to_string())
    }
  }
}
