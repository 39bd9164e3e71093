//! Key-driven query synchronization, inspired by TanStack Query.
//!
//! A [`QuerySync`] follows one "current" key. Each `sync(key)` either serves
//! fresh cached data, attaches to a request already in flight, or starts a
//! new one through the shared [`QueryClient`]. Only the response for the
//! key that is still current is applied to the displayed state; responses
//! for superseded keys land in the cache under their own key and nowhere
//! else.
//!
//! # Example
//!
//! ```ignore
//! let backend = session.backend();
//! let query = QuerySync::new(session.stats_client(), move |_key: &NewsQueryKey| {
//!     let backend = backend.clone();
//!     async move { backend.news_stats().await }
//! });
//!
//! query.sync(NewsQueryKey::Stats);
//!
//! // In render
//! match query.snapshot() {
//!     QueryState::Loading { previous } => render_spinner(previous),
//!     QueryState::Success(page) => render_page(page),
//!     QueryState::Error { error, previous } => render_error(error, previous),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

use crate::cache::{CacheEvent, QueryClient, QueryKey};
use crate::error::{AppError, AppResult};
use crate::observer::{Listeners, Subscription};

/// What a view renders for the current key
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// No key requested yet
  Idle,
  /// A request is running; `previous` is whatever the cache already holds
  Loading { previous: Option<T> },
  Success(T),
  /// The last request failed; `previous` is the last good value, if any
  Error { error: AppError, previous: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading { .. })
  }

  /// Best data to show: current, or stale while loading or failed
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Loading { previous } | QueryState::Error { previous, .. } => previous.as_ref(),
      QueryState::Idle => None,
    }
  }
}

type Fetcher<K, T> = Arc<dyn Fn(&K) -> BoxFuture<'static, AppResult<T>> + Send + Sync>;

#[derive(Debug, Clone)]
enum Phase {
  Idle,
  Loading,
  Ready,
  Failed(AppError),
}

struct SyncState<K> {
  /// Current key and its cache hash
  current: Option<(K, String)>,
  /// Bumped for every request issued; a completion applies only if it
  /// still matches
  generation: u64,
  attached: bool,
  phase: Phase,
}

struct Inner<K, T> {
  client: QueryClient<T>,
  fetcher: Fetcher<K, T>,
  state: Mutex<SyncState<K>>,
  listeners: Listeners<()>,
  cache_subscription: Mutex<Option<Subscription>>,
}

/// Follows a current query key and exposes its state.
///
/// Dropping the `QuerySync` detaches it: completions still arriving are
/// committed to the cache but never touch this state.
pub struct QuerySync<K: QueryKey, T: Clone + Send + Sync + 'static> {
  inner: Arc<Inner<K, T>>,
}

/// Weak, cloneable handle for driving a [`QuerySync`] from listeners.
pub struct QueryHandle<K, T> {
  inner: Weak<Inner<K, T>>,
}

impl<K, T> Clone for QueryHandle<K, T> {
  fn clone(&self) -> Self {
    Self {
      inner: Weak::clone(&self.inner),
    }
  }
}

impl<K: QueryKey, T: Clone + Send + Sync + 'static> QueryHandle<K, T> {
  /// Same as [`QuerySync::sync`]; a no-op once the query is gone.
  pub fn sync(&self, key: K) {
    if let Some(inner) = self.inner.upgrade() {
      Inner::sync(&inner, key);
    }
  }
}

impl<K: QueryKey, T: Clone + Send + Sync + 'static> QuerySync<K, T> {
  pub fn new<F, Fut>(client: QueryClient<T>, fetcher: F) -> Self
  where
    F: Fn(&K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
  {
    let inner = Arc::new(Inner {
      client,
      fetcher: Arc::new(move |key: &K| fetcher(key).boxed()),
      state: Mutex::new(SyncState {
        current: None,
        generation: 0,
        attached: true,
        phase: Phase::Idle,
      }),
      listeners: Listeners::new(),
      cache_subscription: Mutex::new(None),
    });

    let weak = Arc::downgrade(&inner);
    let subscription = inner.client.cache().subscribe(move |event| {
      if let Some(inner) = weak.upgrade() {
        Inner::on_cache_event(&inner, event);
      }
    });
    *inner
      .cache_subscription
      .lock()
      .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

    Self { inner }
  }

  /// Make `key` current, fetching it unless fresh data is cached.
  pub fn sync(&self, key: K) {
    Inner::sync(&self.inner, key);
  }

  /// Invalidate the current key and fetch it again.
  pub fn refetch(&self) {
    let hash = self.inner.lock().current.as_ref().map(|(_, h)| h.clone());
    let Some(hash) = hash else {
      return;
    };
    // A known entry refetches through the invalidation event
    if !self.inner.client.cache().invalidate(&hash) {
      Inner::force_fetch(&self.inner);
    }
  }

  pub fn snapshot(&self) -> QueryState<T> {
    let (hash, phase) = {
      let state = self.inner.lock();
      (
        state.current.as_ref().map(|(_, h)| h.clone()),
        state.phase.clone(),
      )
    };
    let Some(hash) = hash else {
      return QueryState::Idle;
    };

    let data = self.inner.client.cache().data(&hash);
    match phase {
      Phase::Idle => QueryState::Idle,
      Phase::Loading => QueryState::Loading { previous: data },
      Phase::Ready => match data {
        Some(data) => QueryState::Success(data),
        None => QueryState::Idle,
      },
      Phase::Failed(error) => QueryState::Error {
        error,
        previous: data,
      },
    }
  }

  pub fn current_key(&self) -> Option<K> {
    self.inner.lock().current.as_ref().map(|(k, _)| k.clone())
  }

  /// Called after every change to what `snapshot` would return.
  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&()) + Send + Sync + 'static,
  {
    self.inner.listeners.subscribe(listener)
  }

  pub fn handle(&self) -> QueryHandle<K, T> {
    QueryHandle {
      inner: Arc::downgrade(&self.inner),
    }
  }

  /// Stop applying results. Idempotent.
  pub fn detach(&self) {
    self.inner.lock().attached = false;
    let subscription = self
      .inner
      .cache_subscription
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    drop(subscription);
  }

  pub fn is_attached(&self) -> bool {
    self.inner.lock().attached
  }
}

impl<K: QueryKey, T: Clone + Send + Sync + 'static> Drop for QuerySync<K, T> {
  fn drop(&mut self) {
    self.detach();
  }
}

impl<K: QueryKey, T: Clone + Send + Sync + 'static> Inner<K, T> {
  fn lock(&self) -> MutexGuard<'_, SyncState<K>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_current(state: &SyncState<K>, hash: &str) -> bool {
    state
      .current
      .as_ref()
      .map(|(_, h)| h == hash)
      .unwrap_or(false)
  }

  fn sync(this: &Arc<Self>, key: K) {
    let hash = key.cache_hash();
    let fresh = this.client.cache().is_fresh(&hash);

    let generation = {
      let mut state = this.lock();
      if !state.attached {
        return;
      }
      if Self::is_current(&state, &hash)
        && (fresh || matches!(state.phase, Phase::Loading))
      {
        return;
      }

      state.current = Some((key.clone(), hash.clone()));
      state.generation += 1;
      if fresh {
        state.phase = Phase::Ready;
        None
      } else {
        state.phase = Phase::Loading;
        Some(state.generation)
      }
    };

    match generation {
      Some(generation) => {
        this.listeners.notify(&());
        Self::start_fetch(this, key, hash, generation);
      }
      None => {
        debug!(query = %key.description(), "serving fresh cache");
        this.listeners.notify(&());
      }
    }
  }

  /// Fetch the current key regardless of freshness.
  fn force_fetch(this: &Arc<Self>) {
    let target = {
      let mut state = this.lock();
      if !state.attached {
        return;
      }
      match state.current.clone() {
        Some((key, hash)) => {
          state.generation += 1;
          state.phase = Phase::Loading;
          Some((key, hash, state.generation))
        }
        None => None,
      }
    };

    if let Some((key, hash, generation)) = target {
      this.listeners.notify(&());
      Self::start_fetch(this, key, hash, generation);
    }
  }

  fn start_fetch(this: &Arc<Self>, key: K, hash: String, generation: u64) {
    let fetcher = Arc::clone(&this.fetcher);
    let fetch_key = key.clone();
    let request = this.client.fetch(&key, move || fetcher(&fetch_key));

    let weak = Arc::downgrade(this);
    tokio::spawn(async move {
      let result = request.await;
      if let Some(inner) = weak.upgrade() {
        inner.apply(generation, &hash, result);
      }
    });
  }

  fn apply(&self, generation: u64, hash: &str, result: AppResult<T>) {
    let applied = {
      let mut state = self.lock();
      if !state.attached || state.generation != generation || !Self::is_current(&state, hash) {
        false
      } else {
        state.phase = match result {
          Ok(_) => Phase::Ready,
          Err(error) => Phase::Failed(error),
        };
        true
      }
    };

    if applied {
      self.listeners.notify(&());
    } else {
      debug!(generation, "discarding superseded response");
    }
  }

  fn on_cache_event(this: &Arc<Self>, event: &CacheEvent) {
    match event {
      CacheEvent::Invalidated { key } => {
        let current = {
          let state = this.lock();
          state.attached && Self::is_current(&state, key)
        };
        if current {
          Self::force_fetch(this);
        }
      }
      CacheEvent::Updated { key } => {
        if Self::is_current(&this.lock(), key) {
          this.listeners.notify(&());
        }
      }
      CacheEvent::Cleared => {
        {
          let mut state = this.lock();
          state.current = None;
          state.phase = Phase::Idle;
          state.generation += 1;
        }
        this.listeners.notify(&());
      }
    }
  }
}
