//! Query client: request deduplication and retries on top of the cache.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppResult;

use super::store::QueryCache;
use super::traits::QueryKey;

/// A fetch that any number of callers can await.
pub type SharedFetch<T> = Shared<BoxFuture<'static, AppResult<T>>>;

type InFlight<T> = Arc<Mutex<HashMap<String, SharedFetch<T>>>>;

/// Retry rules for reads. Only network errors are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub retries: u32,
  /// Delay before the first retry; grows linearly
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: 2,
      backoff: Duration::from_millis(250),
    }
  }
}

impl RetryPolicy {
  pub fn none() -> Self {
    Self {
      retries: 0,
      backoff: Duration::ZERO,
    }
  }
}

/// Fetches through a [`QueryCache`], allowing at most one outstanding
/// request per key.
pub struct QueryClient<T> {
  cache: Arc<QueryCache<T>>,
  in_flight: InFlight<T>,
  retry: RetryPolicy,
}

impl<T> Clone for QueryClient<T> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      in_flight: Arc::clone(&self.in_flight),
      retry: self.retry,
    }
  }
}

impl<T: Clone + Send + Sync + 'static> QueryClient<T> {
  pub fn new(cache: Arc<QueryCache<T>>) -> Self {
    Self {
      cache,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn cache(&self) -> &Arc<QueryCache<T>> {
    &self.cache
  }

  /// Whether a request for `key` is currently outstanding
  pub fn is_fetching<K: QueryKey>(&self, key: &K) -> bool {
    self.lock_in_flight().contains_key(&key.cache_hash())
  }

  /// Fetch `key`, or attach to the request already in flight for it.
  ///
  /// The request runs on its own task, so it completes and commits to the
  /// cache even if every caller drops the returned future.
  pub fn fetch<K, F, Fut>(&self, key: &K, fetcher: F) -> SharedFetch<T>
  where
    K: QueryKey,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let (shared, started) = {
      let mut in_flight = self.lock_in_flight();
      match in_flight.get(&hash) {
        Some(existing) => {
          debug!(query = %key.description(), "attaching to in-flight request");
          (existing.clone(), false)
        }
        None => {
          let request = run_request(
            Arc::clone(&self.cache),
            Arc::clone(&self.in_flight),
            self.retry,
            hash.clone(),
            key.description(),
            fetcher,
          )
          .boxed()
          .shared();
          in_flight.insert(hash.clone(), request.clone());
          (request, true)
        }
      }
    };

    if started {
      self.cache.mark_loading(&hash);
      tokio::spawn(shared.clone());
    }
    shared
  }

  /// Mark `key` stale. Returns false if nothing is cached under it.
  pub fn invalidate<K: QueryKey>(&self, key: &K) -> bool {
    self.cache.invalidate(&key.cache_hash())
  }

  pub fn data<K: QueryKey>(&self, key: &K) -> Option<T> {
    self.cache.data(&key.cache_hash())
  }

  fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedFetch<T>>> {
    self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

async fn run_request<T, F, Fut>(
  cache: Arc<QueryCache<T>>,
  in_flight: InFlight<T>,
  retry: RetryPolicy,
  hash: String,
  description: String,
  fetcher: F,
) -> AppResult<T>
where
  T: Clone + Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = AppResult<T>> + Send + 'static,
{
  debug!(query = %description, "fetching");
  let mut attempt = 0;
  let result = loop {
    match fetcher().await {
      Ok(data) => break Ok(data),
      Err(e) if e.is_retryable() && attempt < retry.retries => {
        attempt += 1;
        warn!(query = %description, attempt, error = %e, "fetch failed, retrying");
        tokio::time::sleep(retry.backoff * attempt).await;
      }
      Err(e) => break Err(e),
    }
  };

  in_flight
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .remove(&hash);

  match &result {
    Ok(data) => cache.commit_success(&hash, data.clone()),
    Err(e) => {
      warn!(query = %description, error = %e, "fetch failed");
      cache.commit_error(&hash, e.clone());
    }
  }
  result
}
