//! Per-login wiring of the backend, caches and coordinators.

use std::sync::Arc;
use tracing::info;

use crate::api::types::{NewsPage, NewsStats, ProfileUser};
use crate::api::{NewsBackend, NewsQueryKey};
use crate::cache::{QueryCache, QueryClient, QueryKey};
use crate::config::CacheConfig;
use crate::error::AppError;
use crate::news::NewsActions;
use crate::profile::ProfileCoordinator;
use crate::query::QuerySync;

/// Owns the query caches for one session.
///
/// Caches are created in [`Session::start`] and emptied by [`Session::end`].
#[derive(Clone)]
pub struct Session {
  backend: Arc<dyn NewsBackend>,
  pages: QueryClient<NewsPage>,
  stats: QueryClient<NewsStats>,
  profile: QueryClient<ProfileUser>,
  coordinator: ProfileCoordinator,
  actions: NewsActions,
}

fn client_for<T: Clone + Send + Sync + 'static>(config: &CacheConfig) -> QueryClient<T> {
  let cache = QueryCache::new().with_stale_time(config.stale_time());
  QueryClient::new(Arc::new(cache)).with_retry(config.retry_policy())
}

impl Session {
  pub fn start(backend: Arc<dyn NewsBackend>, config: &CacheConfig) -> Self {
    let pages = client_for(config);
    let stats = client_for(config);
    let profile = client_for(config);
    let coordinator = ProfileCoordinator::new(Arc::clone(&backend), QueryClient::clone(&profile));
    let actions = NewsActions::new(
      Arc::clone(&backend),
      QueryClient::clone(&pages),
      QueryClient::clone(&stats),
    );
    info!(stale_secs = config.stale_secs, "session started");

    Self {
      backend,
      pages,
      stats,
      profile,
      coordinator,
      actions,
    }
  }

  pub fn profile(&self) -> &ProfileCoordinator {
    &self.coordinator
  }

  pub fn actions(&self) -> &NewsActions {
    &self.actions
  }

  /// Synchronizer for board pages
  pub fn news_query(&self) -> QuerySync<NewsQueryKey, NewsPage> {
    let backend = Arc::clone(&self.backend);
    QuerySync::new(self.pages.clone(), move |key: &NewsQueryKey| {
      let backend = Arc::clone(&backend);
      let key = key.clone();
      async move {
        match key {
          NewsQueryKey::NewsPage(filters) => backend.list_news(&filters).await,
          other => Err(AppError::State(format!(
            "{} is not a news page",
            other.description()
          ))),
        }
      }
    })
  }

  /// Synchronizer for the public feed, sharing the page cache
  pub fn public_query(&self) -> QuerySync<NewsQueryKey, NewsPage> {
    let backend = Arc::clone(&self.backend);
    QuerySync::new(self.pages.clone(), move |key: &NewsQueryKey| {
      let backend = Arc::clone(&backend);
      let key = key.clone();
      async move {
        match key {
          NewsQueryKey::PublicPage(filters) => backend.list_public_news(&filters).await,
          other => Err(AppError::State(format!(
            "{} is not a public page",
            other.description()
          ))),
        }
      }
    })
  }

  pub fn stats_query(&self) -> QuerySync<NewsQueryKey, NewsStats> {
    let backend = Arc::clone(&self.backend);
    QuerySync::new(self.stats.clone(), move |_key: &NewsQueryKey| {
      let backend = Arc::clone(&backend);
      async move { backend.news_stats().await }
    })
  }

  pub fn profile_query(&self) -> QuerySync<NewsQueryKey, ProfileUser> {
    let backend = Arc::clone(&self.backend);
    QuerySync::new(self.profile.clone(), move |_key: &NewsQueryKey| {
      let backend = Arc::clone(&backend);
      async move { backend.get_profile().await }
    })
  }

  /// Drop every cached result.
  pub fn end(&self) {
    self.pages.cache().clear();
    self.stats.cache().clear();
    self.profile.cache().clear();
    info!("session ended");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::{alice, news_item, FakeBackend};
  use crate::api::types::{NewsCategory, NewsStatus};
  use crate::filters::{FilterPatch, FilterStore};
  use crate::grouping::group_by_status;
  use crate::query::QueryState;
  use std::time::Duration;

  fn backend() -> Arc<FakeBackend> {
    let backend = FakeBackend::with_news(vec![
      news_item("r1", NewsCategory::Research, NewsStatus::Pending, true),
      news_item("r2", NewsCategory::Research, NewsStatus::Read, true),
      news_item("r3", NewsCategory::Research, NewsStatus::Reading, false),
      news_item("p1", NewsCategory::Product, NewsStatus::Pending, true),
    ]);
    *backend.profile.lock().unwrap() = Some(alice());
    Arc::new(backend)
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  #[tokio::test]
  async fn test_research_favorites_board() {
    let backend = backend();
    let session = Session::start(backend.clone(), &CacheConfig::default());
    let query = session.news_query();
    let filters = FilterStore::default();
    let handle = query.handle();
    let _sub = filters.subscribe(move |p| handle.sync(NewsQueryKey::NewsPage(p.clone())));

    filters
      .set_filters(FilterPatch {
        category: NewsCategory::Research.into(),
        is_favorite: true.into(),
        ..FilterPatch::default()
      })
      .unwrap();
    settle().await;

    let QueryState::Success(page) = query.snapshot() else {
      panic!("expected data");
    };
    let columns = group_by_status(&page.items);
    let ids = |s: NewsStatus| columns[&s].iter().map(|i| i.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids(NewsStatus::Pending), vec!["r1"]);
    assert!(ids(NewsStatus::Reading).is_empty());
    assert_eq!(ids(NewsStatus::Read), vec!["r2"]);
  }

  #[tokio::test]
  async fn test_status_change_refreshes_board() {
    let backend = backend();
    let session = Session::start(backend.clone(), &CacheConfig::default());
    let query = session.news_query();
    query.sync(NewsQueryKey::NewsPage(Default::default()));
    settle().await;
    assert_eq!(backend.calls("list_news"), 1);

    session
      .actions()
      .set_status("p1", NewsStatus::Read)
      .await
      .unwrap();
    settle().await;

    assert_eq!(backend.calls("list_news"), 2);
    let page = query.snapshot().data().cloned().unwrap();
    let moved = page.items.iter().find(|i| i.id == "p1").unwrap();
    assert_eq!(moved.status, NewsStatus::Read);
  }

  #[tokio::test]
  async fn test_profile_commit_revalidates_profile_query() {
    let backend = backend();
    let session = Session::start(backend.clone(), &CacheConfig::default());
    let query = session.profile_query();
    query.sync(NewsQueryKey::Profile);
    settle().await;
    assert_eq!(query.snapshot().data().map(|p| p.username.as_str()), Some("alice"));

    session
      .profile()
      .update_profile(crate::api::types::ProfilePatch::username("alice_2"))
      .await
      .unwrap();
    settle().await;

    assert_eq!(backend.calls("get_profile"), 2);
    assert_eq!(
      query.snapshot(),
      QueryState::Success(backend.profile.lock().unwrap().clone().unwrap())
    );
  }

  #[tokio::test]
  async fn test_end_clears_caches() {
    let backend = backend();
    let session = Session::start(backend, &CacheConfig::default());
    let query = session.news_query();
    query.sync(NewsQueryKey::NewsPage(Default::default()));
    settle().await;
    assert!(query.snapshot().data().is_some());

    session.end();
    assert_eq!(query.snapshot(), QueryState::Idle);
    assert!(session.profile().cached_profile().is_none());
  }

  #[tokio::test]
  async fn test_public_feed_shows_shared_items_and_follows_mutations() {
    let backend = backend();
    for item in backend.news.lock().unwrap().iter_mut() {
      item.is_public = item.id.starts_with('r');
    }
    let session = Session::start(backend.clone(), &CacheConfig::default());
    let query = session.public_query();
    query.sync(NewsQueryKey::PublicPage(Default::default()));
    settle().await;

    let page = query.snapshot().data().cloned().unwrap();
    let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);

    session.actions().toggle_favorite("r3").await.unwrap();
    settle().await;
    assert_eq!(backend.calls("list_public_news"), 2);
    let page = query.snapshot().data().cloned().unwrap();
    assert!(page.items.iter().any(|i| i.id == "r3" && i.is_favorite));
  }
}
