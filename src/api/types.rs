use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::api_types::timestamp;

/// News category as named on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
  General,
  Research,
  Product,
  Company,
  Tutorial,
  Opinion,
}

impl NewsCategory {
  pub const ALL: [NewsCategory; 6] = [
    NewsCategory::General,
    NewsCategory::Research,
    NewsCategory::Product,
    NewsCategory::Company,
    NewsCategory::Tutorial,
    NewsCategory::Opinion,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      NewsCategory::General => "general",
      NewsCategory::Research => "research",
      NewsCategory::Product => "product",
      NewsCategory::Company => "company",
      NewsCategory::Tutorial => "tutorial",
      NewsCategory::Opinion => "opinion",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      NewsCategory::General => "General",
      NewsCategory::Research => "Research",
      NewsCategory::Product => "Product",
      NewsCategory::Company => "Company",
      NewsCategory::Tutorial => "Tutorial",
      NewsCategory::Opinion => "Opinion",
    }
  }
}

impl std::str::FromStr for NewsCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    NewsCategory::ALL
      .into_iter()
      .find(|c| c.as_str() == wanted)
      .ok_or_else(|| {
        let names: Vec<&str> = NewsCategory::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown category '{}', expected one of: {}", s, names.join(", "))
      })
  }
}

/// Reading status; also the Kanban column a card sits in.
///
/// Variant order is column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
  Pending,
  Reading,
  Read,
}

impl NewsStatus {
  pub const ALL: [NewsStatus; 3] = [NewsStatus::Pending, NewsStatus::Reading, NewsStatus::Read];

  pub fn as_str(&self) -> &'static str {
    match self {
      NewsStatus::Pending => "pending",
      NewsStatus::Reading => "reading",
      NewsStatus::Read => "read",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      NewsStatus::Pending => "Pending",
      NewsStatus::Reading => "Reading",
      NewsStatus::Read => "Read",
    }
  }
}

/// A news article as owned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
  pub id: String,
  pub source: String,
  pub title: String,
  #[serde(default)]
  pub summary: String,
  #[serde(default)]
  pub link: String,
  #[serde(default)]
  pub image_url: Option<String>,
  pub category: NewsCategory,
  pub status: NewsStatus,
  #[serde(default)]
  pub is_favorite: bool,
  #[serde(default)]
  pub is_public: bool,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default, with = "timestamp::option")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, with = "timestamp::option")]
  pub updated_at: Option<DateTime<Utc>>,
}

/// One page of the news collection plus pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewsPage {
  #[serde(default)]
  pub items: Vec<NewsItem>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub offset: u64,
  #[serde(default)]
  pub limit: u64,
}

/// Per-status counters for the current user's news
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewsStats {
  pub pending_count: u64,
  pub reading_count: u64,
  pub read_count: u64,
  pub favorite_count: u64,
  pub total_count: u64,
}

impl NewsStats {
  pub fn count_for(&self, status: NewsStatus) -> u64 {
    match status {
      NewsStatus::Pending => self.pending_count,
      NewsStatus::Reading => self.reading_count,
      NewsStatus::Read => self.read_count,
    }
  }
}

/// Body of `POST /api/news`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsDraft {
  pub source: String,
  pub title: String,
  pub summary: String,
  pub link: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  pub category: NewsCategory,
  pub is_public: bool,
}

/// The signed-in user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUser {
  pub id: String,
  pub username: String,
  pub email: String,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default, with = "timestamp::option")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, with = "timestamp::option")]
  pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
  true
}

impl ProfileUser {
  /// Shallow merge of a patch over this profile
  pub fn apply(&self, patch: &ProfilePatch) -> ProfileUser {
    ProfileUser {
      username: patch
        .username
        .clone()
        .unwrap_or_else(|| self.username.clone()),
      email: patch.email.clone().unwrap_or_else(|| self.email.clone()),
      ..self.clone()
    }
  }

  pub fn account_status(&self) -> &'static str {
    if self.is_active {
      "active"
    } else {
      "inactive"
    }
  }
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

impl ProfilePatch {
  pub fn username(username: impl Into<String>) -> Self {
    Self {
      username: Some(username.into()),
      email: None,
    }
  }

  pub fn email(email: impl Into<String>) -> Self {
    Self {
      username: None,
      email: Some(email.into()),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.username.is_none() && self.email.is_none()
  }
}

/// Body of the password change request
#[derive(Clone, Serialize)]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password: String,
}

impl std::fmt::Debug for PasswordChange {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PasswordChange").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_category_from_str() {
    assert_eq!("Research".parse::<NewsCategory>(), Ok(NewsCategory::Research));
    assert!("sports".parse::<NewsCategory>().unwrap_err().contains("opinion"));
  }

  fn alice() -> ProfileUser {
    ProfileUser {
      id: "u1".to_string(),
      username: "alice".to_string(),
      email: "a@x.com".to_string(),
      is_active: true,
      created_at: None,
      updated_at: None,
    }
  }

  #[test]
  fn test_apply_patch_keeps_unpatched_fields() {
    let patched = alice().apply(&ProfilePatch::username("alice2"));
    assert_eq!(patched.username, "alice2");
    assert_eq!(patched.email, "a@x.com");
    assert_eq!(patched.id, "u1");
  }

  #[test]
  fn test_patch_serializes_only_present_fields() {
    let body = serde_json::to_value(ProfilePatch::email("b@x.com")).unwrap();
    assert_eq!(body, serde_json::json!({ "email": "b@x.com" }));
  }

  #[test]
  fn test_news_item_from_backend_json() {
    let item: NewsItem = serde_json::from_value(serde_json::json!({
      "id": "507f1f77bcf86cd799439011",
      "source": "TechCrunch",
      "title": "AI Breakthrough",
      "summary": "New AI technology announced",
      "link": "https://example.com/news",
      "image_url": null,
      "category": "research",
      "status": "reading",
      "is_favorite": true,
      "is_public": true,
      "user_id": "user123",
      "created_at": "2024-01-01T10:00:00",
      "updated_at": "2024-01-02T10:00:00.123456+00:00"
    }))
    .unwrap();

    assert_eq!(item.category, NewsCategory::Research);
    assert_eq!(item.status, NewsStatus::Reading);
    assert!(item.is_favorite);
    assert!(item.created_at.is_some());
    assert!(item.updated_at.is_some());
  }

  #[test]
  fn test_status_order_is_column_order() {
    let mut statuses = vec![NewsStatus::Read, NewsStatus::Pending, NewsStatus::Reading];
    statuses.sort();
    assert_eq!(statuses, NewsStatus::ALL.to_vec());
  }

  #[test]
  fn test_password_change_debug_hides_secrets() {
    let change = PasswordChange {
      current_password: "hunter22".to_string(),
      new_password: "hunter23".to_string(),
    };
    assert!(!format!("{:?}", change).contains("hunter"));
  }
}
