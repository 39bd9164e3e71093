//! In-memory query cache.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::AppError;
use crate::observer::{Listeners, Subscription};

use super::traits::{CacheEntry, CacheEvent, QueryStatus};

/// Keyed store of query results for values of type `T`.
///
/// The map lock is never held while listeners run, and never across an
/// `.await`.
pub struct QueryCache<T> {
  entries: Mutex<HashMap<String, CacheEntry<T>>>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  listeners: Listeners<CacheEvent>,
}

impl<T: Clone + Send + 'static> Default for QueryCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone + Send + 'static> QueryCache<T> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      stale_time: Duration::minutes(5),
      listeners: Listeners::new(),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
    self.lock().get(key).cloned()
  }

  pub fn data(&self, key: &str) -> Option<T> {
    self.lock().get(key).and_then(|e| e.data.clone())
  }

  pub fn is_fresh(&self, key: &str) -> bool {
    self
      .lock()
      .get(key)
      .map(|e| e.is_fresh(self.stale_time))
      .unwrap_or(false)
  }

  pub fn status(&self, key: &str) -> QueryStatus {
    self.lock().get(key).map(|e| e.status).unwrap_or_default()
  }

  /// Mark `key` as loading, creating the entry on first use.
  pub fn mark_loading(&self, key: &str) {
    self.update(key, |entry| {
      entry.status = QueryStatus::Loading;
    });
  }

  /// Store a successful fetch result.
  pub fn commit_success(&self, key: &str, data: T) {
    self.update(key, |entry| {
      entry.data = Some(data);
      entry.status = QueryStatus::Success;
      entry.error = None;
      entry.fetched_at = Some(Utc::now());
      entry.invalidated = false;
    });
  }

  /// Record a failed fetch. Previous data is kept.
  pub fn commit_error(&self, key: &str, error: AppError) {
    self.update(key, |entry| {
      entry.status = QueryStatus::Error;
      entry.error = Some(error);
    });
  }

  /// Overwrite the data for `key` without touching freshness.
  ///
  /// Used for optimistic writes and their rollback.
  pub fn set_data(&self, key: &str, data: Option<T>) {
    self.update(key, |entry| {
      entry.data = data;
    });
  }

  /// Replace the data for `key` only while it still equals `expected`.
  pub fn replace_data_if(&self, key: &str, expected: &T, data: Option<T>) -> bool
  where
    T: PartialEq,
  {
    let replaced = {
      let mut entries = self.lock();
      match entries.get_mut(key) {
        Some(entry) if entry.data.as_ref() == Some(expected) => {
          entry.data = data;
          true
        }
        _ => false,
      }
    };
    if replaced {
      self.listeners.notify(&CacheEvent::Updated {
        key: key.to_string(),
      });
    }
    replaced
  }

  /// Mark `key` as needing revalidation. Returns false if unknown.
  pub fn invalidate(&self, key: &str) -> bool {
    let found = {
      let mut entries = self.lock();
      match entries.get_mut(key) {
        Some(entry) => {
          entry.invalidated = true;
          true
        }
        None => false,
      }
    };
    if found {
      debug!(key, "cache entry invalidated");
      self.listeners.notify(&CacheEvent::Invalidated {
        key: key.to_string(),
      });
    }
    found
  }

  /// Invalidate every entry.
  pub fn invalidate_all(&self) -> usize {
    let keys: Vec<String> = {
      let mut entries = self.lock();
      entries
        .values_mut()
        .map(|entry| {
          entry.invalidated = true;
          entry.key.clone()
        })
        .collect()
    };
    debug!(count = keys.len(), "cache entries invalidated");
    for key in &keys {
      self
        .listeners
        .notify(&CacheEvent::Invalidated { key: key.clone() });
    }
    keys.len()
  }

  /// Drop every entry.
  pub fn clear(&self) {
    self.lock().clear();
    self.listeners.notify(&CacheEvent::Cleared);
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&CacheEvent) + Send + Sync + 'static,
  {
    self.listeners.subscribe(listener)
  }

  fn update(&self, key: &str, f: impl FnOnce(&mut CacheEntry<T>)) {
    {
      let mut entries = self.lock();
      let entry = entries
        .entry(key.to_string())
        .or_insert_with(|| CacheEntry::new(key));
      f(entry);
    }
    self.listeners.notify(&CacheEvent::Updated {
      key: key.to_string(),
    });
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
