//! Core traits and types for the caching system.

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;

/// A key under which query results are cached.
///
/// `cache_hash` must be deterministic: two keys describing the same request
/// hash identically, whatever order their parts were assembled in.
pub trait QueryKey: Clone + Send + Sync + 'static {
  /// Stable, fixed-length cache key
  fn cache_hash(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

/// Lifecycle of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  #[default]
  Idle,
  Loading,
  Success,
  Error,
}

/// One cached query result and its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub key: String,
  /// Last good value. Kept across failed refreshes.
  pub data: Option<T>,
  pub status: QueryStatus,
  pub error: Option<AppError>,
  pub fetched_at: Option<DateTime<Utc>>,
  /// Set by `invalidate`, cleared by the next successful commit
  pub invalidated: bool,
}

impl<T> CacheEntry<T> {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      data: None,
      status: QueryStatus::Idle,
      error: None,
      fetched_at: None,
      invalidated: false,
    }
  }

  /// Fresh means: fetched within `stale_time`, not invalidated, not failed.
  pub fn is_fresh(&self, stale_time: Duration) -> bool {
    if self.invalidated || self.status == QueryStatus::Error {
      return false;
    }
    match self.fetched_at {
      Some(at) => Utc::now() - at <= stale_time,
      None => false,
    }
  }
}

/// Change notifications emitted by a `QueryCache`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// Data, status or error for `key` changed
  Updated { key: String },
  /// `key` was marked as needing revalidation
  Invalidated { key: String },
  /// Every entry was dropped
  Cleared,
}
