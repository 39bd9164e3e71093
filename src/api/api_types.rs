//! Wire-level types for the backend's request and error bodies.
//!
//! Domain types in `types.rs` deserialize directly from response bodies; what
//! lives here are envelopes, error payloads and the status → error mapping.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::types::NewsStatus;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiStatusUpdate {
  pub status: NewsStatus,
}

// ============================================================================
// Error bodies
// ============================================================================

/// `{"detail": "..."}` or the 422 list form `{"detail": [{"loc": [...], "msg": "..."}]}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub detail: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorDetail {
  Message(String),
  Items(Vec<ApiValidationItem>),
}

#[derive(Debug, Deserialize)]
pub struct ApiValidationItem {
  #[serde(default)]
  pub loc: Vec<serde_json::Value>,
  pub msg: String,
}

impl ApiValidationItem {
  /// Last named location segment, skipping the "body" root
  fn field(&self) -> Option<String> {
    self
      .loc
      .iter()
      .rev()
      .filter_map(|v| v.as_str())
      .find(|s| *s != "body" && *s != "query")
      .map(String::from)
  }
}

/// Map a non-success response to the error taxonomy.
pub fn error_from_response(status: u16, body: &str) -> AppError {
  let (field, message) = match serde_json::from_str::<ApiErrorBody>(body).map(|b| b.detail) {
    Ok(ApiErrorDetail::Message(message)) => (None, message),
    Ok(ApiErrorDetail::Items(items)) => match items.first() {
      Some(item) => (item.field(), item.msg.clone()),
      None => (None, format!("request rejected ({})", status)),
    },
    Err(_) if body.trim().is_empty() => (None, format!("request failed ({})", status)),
    Err(_) => (None, body.trim().to_string()),
  };

  match status {
    400 if is_uniqueness_violation(&message) => AppError::Conflict(message),
    400 | 422 => AppError::Validation { field, message },
    401 | 403 => AppError::Auth(message),
    404 => AppError::NotFound(message),
    409 => AppError::Conflict(message),
    408 | 429 | 500..=599 => AppError::Network(format!("server returned {}: {}", status, message)),
    _ => AppError::Validation { field, message },
  }
}

/// The backend reports duplicate username/email as a plain 400.
fn is_uniqueness_violation(message: &str) -> bool {
  let lower = message.to_lowercase();
  lower.contains("already exists") || lower.contains("already taken")
}

// ============================================================================
// Timestamps
// ============================================================================

/// The backend emits both offset-qualified and naive UTC timestamps.
pub mod timestamp {
  use chrono::{DateTime, NaiveDateTime, Utc};

  pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
      .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
      .map(|dt| dt.and_utc())
      .ok()
  }

  pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
      S: Serializer,
    {
      match value {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
      }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
      D: Deserializer<'de>,
    {
      let raw: Option<String> = Option::deserialize(deserializer)?;
      match raw {
        None => Ok(None),
        Some(s) => super::parse(&s)
          .map(Some)
          .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_plain_detail_maps_by_status() {
    let body = r#"{"detail": "Not authenticated"}"#;
    assert_eq!(
      error_from_response(401, body),
      AppError::Auth("Not authenticated".to_string())
    );
    assert!(matches!(error_from_response(409, body), AppError::Conflict(_)));
    assert!(matches!(error_from_response(404, body), AppError::NotFound(_)));
    assert!(matches!(error_from_response(503, body), AppError::Network(_)));
  }

  #[test]
  fn test_duplicate_user_400_is_conflict() {
    let body = r#"{"detail": "User with username bob already exists"}"#;
    assert_eq!(
      error_from_response(400, body),
      AppError::Conflict("User with username bob already exists".to_string())
    );
  }

  #[test]
  fn test_422_list_detail_extracts_field() {
    let body = r#"{"detail": [{"loc": ["body", "username"], "msg": "String should have at least 3 characters", "type": "string_too_short"}]}"#;
    assert_eq!(
      error_from_response(422, body),
      AppError::Validation {
        field: Some("username".to_string()),
        message: "String should have at least 3 characters".to_string(),
      }
    );
  }

  #[test]
  fn test_unparseable_body_is_kept_as_message() {
    match error_from_response(502, "Bad Gateway") {
      AppError::Network(msg) => assert!(msg.contains("Bad Gateway")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_parse_timestamps() {
    assert!(timestamp::parse("2024-01-01T10:00:00Z").is_some());
    assert!(timestamp::parse("2024-01-01T10:00:00.123456").is_some());
    assert!(timestamp::parse("2024-01-01 10:00:00").is_some());
    assert!(timestamp::parse("yesterday").is_none());
  }
}
