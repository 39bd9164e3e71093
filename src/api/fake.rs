//! In-memory backend for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::error::{AppError, AppResult};
use crate::filters::FilterPredicate;

use super::client::NewsBackend;
use super::types::{
  NewsCategory, NewsDraft, NewsItem, NewsPage, NewsStats, NewsStatus, PasswordChange,
  ProfilePatch, ProfileUser,
};

#[derive(Default)]
pub struct FakeBackend {
  pub profile: Mutex<Option<ProfileUser>>,
  pub password: Mutex<String>,
  pub news: Mutex<Vec<NewsItem>>,
  calls: Mutex<HashMap<&'static str, usize>>,
  profile_gate: Mutex<Option<oneshot::Receiver<AppResult<ProfileUser>>>>,
}

impl FakeBackend {
  pub fn with_profile(profile: ProfileUser) -> Self {
    let backend = Self::default();
    *backend.profile.lock().unwrap() = Some(profile);
    *backend.password.lock().unwrap() = "oldpass".to_string();
    backend
  }

  pub fn with_news(news: Vec<NewsItem>) -> Self {
    let backend = Self::default();
    *backend.news.lock().unwrap() = news;
    backend
  }

  /// Hold the next profile update until the returned sender fires.
  pub fn gate_profile_update(&self) -> oneshot::Sender<AppResult<ProfileUser>> {
    let (tx, rx) = oneshot::channel();
    *self.profile_gate.lock().unwrap() = Some(rx);
    tx
  }

  pub fn calls(&self, method: &str) -> usize {
    self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
  }

  fn record(&self, method: &'static str) {
    *self.calls.lock().unwrap().entry(method).or_default() += 1;
  }

  fn find_mut<R>(&self, id: &str, f: impl FnOnce(&mut NewsItem) -> R) -> AppResult<R> {
    let mut news = self.news.lock().unwrap();
    news
      .iter_mut()
      .find(|i| i.id == id)
      .map(f)
      .ok_or_else(|| AppError::NotFound(format!("news {}", id)))
  }
}

pub fn alice() -> ProfileUser {
  ProfileUser {
    id: "u1".to_string(),
    username: "alice".to_string(),
    email: "a@x.com".to_string(),
    is_active: true,
    created_at: None,
    updated_at: None,
  }
}

pub fn news_item(id: &str, category: NewsCategory, status: NewsStatus, fav: bool) -> NewsItem {
  NewsItem {
    id: id.to_string(),
    source: "Feed".to_string(),
    title: format!("Story {}", id),
    summary: String::new(),
    link: format!("https://example.com/{}", id),
    image_url: None,
    category,
    status,
    is_favorite: fav,
    is_public: false,
    user_id: Some("u1".to_string()),
    created_at: None,
    updated_at: None,
  }
}

fn matches(filters: &FilterPredicate, item: &NewsItem) -> bool {
  filters.category.map_or(true, |c| c == item.category)
    && filters.is_favorite.map_or(true, |f| f == item.is_favorite)
    && filters.status.map_or(true, |s| s == item.status)
}

fn paginate(filters: &FilterPredicate, matching: Vec<NewsItem>) -> NewsPage {
  let offset = filters.offset();
  NewsPage {
    total: matching.len() as u64,
    items: matching
      .into_iter()
      .skip(offset as usize)
      .take(filters.page_size as usize)
      .collect(),
    offset,
    limit: u64::from(filters.page_size),
  }
}

#[async_trait]
impl NewsBackend for FakeBackend {
  async fn list_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage> {
    self.record("list_news");
    let news = self.news.lock().unwrap();
    let matching: Vec<NewsItem> = news.iter().filter(|i| matches(filters, i)).cloned().collect();
    Ok(paginate(filters, matching))
  }

  async fn list_public_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage> {
    self.record("list_public_news");
    let scope = filters.public_scope();
    let news = self.news.lock().unwrap();
    let matching: Vec<NewsItem> = news
      .iter()
      .filter(|i| i.is_public && matches(&scope, i))
      .cloned()
      .collect();
    Ok(paginate(&scope, matching))
  }

  async fn create_news(&self, draft: &NewsDraft) -> AppResult<NewsItem> {
    self.record("create_news");
    let mut news = self.news.lock().unwrap();
    if news.iter().any(|i| i.link == draft.link) {
      return Err(AppError::Conflict(format!(
        "News with link {} already exists",
        draft.link
      )));
    }
    let item = NewsItem {
      id: format!("new{}", news.len() + 1),
      source: draft.source.clone(),
      title: draft.title.clone(),
      summary: draft.summary.clone(),
      link: draft.link.clone(),
      image_url: draft.image_url.clone(),
      category: draft.category,
      status: NewsStatus::Pending,
      is_favorite: false,
      is_public: draft.is_public,
      user_id: Some("u1".to_string()),
      created_at: None,
      updated_at: None,
    };
    news.push(item.clone());
    Ok(item)
  }

  async fn news_stats(&self) -> AppResult<NewsStats> {
    self.record("news_stats");
    let news = self.news.lock().unwrap();
    let count = |s: NewsStatus| news.iter().filter(|i| i.status == s).count() as u64;
    Ok(NewsStats {
      pending_count: count(NewsStatus::Pending),
      reading_count: count(NewsStatus::Reading),
      read_count: count(NewsStatus::Read),
      favorite_count: news.iter().filter(|i| i.is_favorite).count() as u64,
      total_count: news.len() as u64,
    })
  }

  async fn toggle_favorite(&self, id: &str) -> AppResult<NewsItem> {
    self.record("toggle_favorite");
    self.find_mut(id, |item| {
      item.is_favorite = !item.is_favorite;
      item.clone()
    })
  }

  async fn set_news_status(&self, id: &str, status: NewsStatus) -> AppResult<NewsItem> {
    self.record("set_news_status");
    self.find_mut(id, |item| {
      item.status = status;
      item.clone()
    })
  }

  async fn get_profile(&self) -> AppResult<ProfileUser> {
    self.record("get_profile");
    self
      .profile
      .lock()
      .unwrap()
      .clone()
      .ok_or_else(|| AppError::NotFound("user".to_string()))
  }

  async fn update_profile(&self, patch: &ProfilePatch) -> AppResult<ProfileUser> {
    self.record("update_profile");
    let gate = self.profile_gate.lock().unwrap().take();
    if let Some(gate) = gate {
      return gate
        .await
        .unwrap_or_else(|_| Err(AppError::Network("connection dropped".to_string())));
    }

    let mut profile = self.profile.lock().unwrap();
    let updated = profile
      .as_ref()
      .map(|p| p.apply(patch))
      .ok_or_else(|| AppError::NotFound("user".to_string()))?;
    *profile = Some(updated.clone());
    Ok(updated)
  }

  async fn change_password(&self, change: &PasswordChange) -> AppResult<()> {
    self.record("change_password");
    let mut password = self.password.lock().unwrap();
    if *password != change.current_password {
      return Err(AppError::validation(None, "Current password is incorrect"));
    }
    *password = change.new_password.clone();
    Ok(())
  }
}
