//! News creation and per-item mutations.
//!
//! These are plain request/response calls: no optimistic write, no retry.
//! A successful change invalidates every cached page and the counters so
//! the board refetches what it shows.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::types::{NewsDraft, NewsItem, NewsPage, NewsStats, NewsStatus};
use crate::api::{NewsBackend, NewsQueryKey};
use crate::cache::QueryClient;
use crate::error::{AppError, AppResult};

/// Local checks on a draft before it is sent.
pub fn validate_draft(draft: &NewsDraft) -> AppResult<()> {
  let required = [
    ("title", &draft.title),
    ("summary", &draft.summary),
    ("link", &draft.link),
    ("source", &draft.source),
  ];
  for (field, value) in required {
    if value.trim().is_empty() {
      return Err(AppError::validation(Some(field), "cannot be empty"));
    }
  }
  let link_ok = url::Url::parse(draft.link.trim())
    .map(|u| matches!(u.scheme(), "http" | "https"))
    .unwrap_or(false);
  if !link_ok {
    return Err(AppError::validation(Some("link"), "must be an http(s) URL"));
  }
  Ok(())
}

#[derive(Clone)]
pub struct NewsActions {
  backend: Arc<dyn NewsBackend>,
  pages: QueryClient<NewsPage>,
  stats: QueryClient<NewsStats>,
}

impl NewsActions {
  pub fn new(
    backend: Arc<dyn NewsBackend>,
    pages: QueryClient<NewsPage>,
    stats: QueryClient<NewsStats>,
  ) -> Self {
    Self {
      backend,
      pages,
      stats,
    }
  }

  /// Add an item to the user's collection. Invalid drafts are not sent.
  pub async fn create_news(&self, draft: NewsDraft) -> AppResult<NewsItem> {
    validate_draft(&draft)?;
    let result = self.backend.create_news(&draft).await;
    self.after_mutation("create", &draft.link, result)
  }

  pub async fn toggle_favorite(&self, id: &str) -> AppResult<NewsItem> {
    let result = self.backend.toggle_favorite(id).await;
    self.after_mutation("toggle favorite", id, result)
  }

  /// Move a card to another column.
  pub async fn set_status(&self, id: &str, status: NewsStatus) -> AppResult<NewsItem> {
    let result = self.backend.set_news_status(id, status).await;
    self.after_mutation("set status", id, result)
  }

  /// Per-status counters, through the stats cache.
  pub async fn stats(&self) -> AppResult<NewsStats> {
    let backend = Arc::clone(&self.backend);
    self
      .stats
      .fetch(&NewsQueryKey::Stats, move || {
        let backend = Arc::clone(&backend);
        async move { backend.news_stats().await }
      })
      .await
  }

  fn after_mutation(
    &self,
    action: &'static str,
    id: &str,
    result: AppResult<NewsItem>,
  ) -> AppResult<NewsItem> {
    match result {
      Ok(item) => {
        info!(action, id, "news item updated");
        self.pages.cache().invalidate_all();
        self.stats.invalidate(&NewsQueryKey::Stats);
        Ok(item)
      }
      Err(e) => {
        warn!(action, id, error = %e, "news item update failed");
        Err(e)
      }
    }
  }
}
