//! Filter state for the news board.
//!
//! [`FilterStore`] holds the active [`FilterPredicate`] and tells its
//! subscribers, synchronously, whenever a change is committed. It never
//! fetches anything itself.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::api::types::{NewsCategory, NewsStatus};
use crate::error::{AppError, AppResult};
use crate::observer::{Listeners, Subscription};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The active set of constraints. `None` means "no constraint".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterPredicate {
  pub category: Option<NewsCategory>,
  pub is_favorite: Option<bool>,
  pub status: Option<NewsStatus>,
  pub date_from: Option<NaiveDate>,
  pub date_to: Option<NaiveDate>,
  pub page: u32,
  pub page_size: u32,
}

impl Default for FilterPredicate {
  fn default() -> Self {
    Self::with_page_size(DEFAULT_PAGE_SIZE)
  }
}

impl FilterPredicate {
  /// All-unset predicate on the first page
  pub fn with_page_size(page_size: u32) -> Self {
    Self {
      category: None,
      is_favorite: None,
      status: None,
      date_from: None,
      date_to: None,
      page: 1,
      page_size: page_size.max(1),
    }
  }

  /// Whether any content constraint is set (pagination excluded)
  pub fn is_constrained(&self) -> bool {
    self.category.is_some()
      || self.is_favorite.is_some()
      || self.status.is_some()
      || self.date_from.is_some()
      || self.date_to.is_some()
  }

  /// Set fields as name/value pairs, sorted by name.
  fn fields(&self) -> BTreeMap<&'static str, String> {
    let mut fields = BTreeMap::new();
    if let Some(category) = self.category {
      fields.insert("category", category.as_str().to_string());
    }
    if let Some(fav) = self.is_favorite {
      fields.insert("is_favorite", fav.to_string());
    }
    if let Some(status) = self.status {
      fields.insert("status", status.as_str().to_string());
    }
    if let Some(from) = self.date_from {
      fields.insert("date_from", from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = self.date_to {
      fields.insert("date_to", to.format("%Y-%m-%d").to_string());
    }
    fields.insert("page", self.page.to_string());
    fields.insert("page_size", self.page_size.to_string());
    fields
  }

  /// Canonical serialization: set fields only, sorted by name, `&`-joined.
  pub fn canonical(&self) -> String {
    self
      .fields()
      .into_iter()
      .map(|(name, value)| format!("{}={}", name, value))
      .collect::<Vec<_>>()
      .join("&")
  }

  /// Query parameters for the news collection endpoint.
  ///
  /// Pagination is sent as `limit`/`offset`.
  pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(category) = self.category {
      params.push(("category", category.as_str().to_string()));
    }
    if let Some(fav) = self.is_favorite {
      params.push(("is_favorite", fav.to_string()));
    }
    if let Some(status) = self.status {
      params.push(("status", status.as_str().to_string()));
    }
    if let Some(from) = self.date_from {
      params.push(("date_from", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = self.date_to {
      params.push(("date_to", to.format("%Y-%m-%d").to_string()));
    }
    params.push(("limit", self.page_size.to_string()));
    params.push(("offset", self.offset().to_string()));
    params
  }

  /// What the public feed understands: category and pagination
  pub fn public_scope(&self) -> FilterPredicate {
    FilterPredicate {
      category: self.category,
      page: self.page,
      ..FilterPredicate::with_page_size(self.page_size)
    }
  }

  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }
}

/// One field of a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Patch<T> {
  /// Not provided; keep the current value
  #[default]
  Keep,
  /// Explicitly cleared
  Clear,
  Set(T),
}

impl<T> Patch<T> {
  fn apply(self, target: &mut Option<T>) {
    match self {
      Patch::Keep => {}
      Patch::Clear => *target = None,
      Patch::Set(value) => *target = Some(value),
    }
  }
}

impl<T> From<Option<T>> for Patch<T> {
  fn from(value: Option<T>) -> Self {
    match value {
      Some(v) => Patch::Set(v),
      None => Patch::Clear,
    }
  }
}

/// Partial update merged by [`FilterStore::set_filters`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
  pub category: Patch<NewsCategory>,
  pub is_favorite: Patch<bool>,
  pub status: Patch<NewsStatus>,
  pub date_from: Patch<NaiveDate>,
  pub date_to: Patch<NaiveDate>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

impl FilterPatch {
  pub fn category(category: impl Into<Patch<NewsCategory>>) -> Self {
    Self {
      category: category.into(),
      ..Self::default()
    }
  }

  pub fn status(status: impl Into<Patch<NewsStatus>>) -> Self {
    Self {
      status: status.into(),
      ..Self::default()
    }
  }

  pub fn page(page: u32) -> Self {
    Self {
      page: Some(page),
      ..Self::default()
    }
  }
}

impl From<NewsCategory> for Patch<NewsCategory> {
  fn from(value: NewsCategory) -> Self {
    Patch::Set(value)
  }
}

impl From<NewsStatus> for Patch<NewsStatus> {
  fn from(value: NewsStatus) -> Self {
    Patch::Set(value)
  }
}

impl From<bool> for Patch<bool> {
  fn from(value: bool) -> Self {
    Patch::Set(value)
  }
}

/// Holder of the active filter predicate
pub struct FilterStore {
  current: Mutex<FilterPredicate>,
  initial: FilterPredicate,
  listeners: Listeners<FilterPredicate>,
}

impl Default for FilterStore {
  fn default() -> Self {
    Self::new(FilterPredicate::default())
  }
}

impl FilterStore {
  /// Create a store starting from `initial`. `clear_filters` returns to
  /// the all-unset predicate with the same page size.
  pub fn new(initial: FilterPredicate) -> Self {
    let base = FilterPredicate::with_page_size(initial.page_size);
    Self {
      current: Mutex::new(initial),
      initial: base,
      listeners: Listeners::new(),
    }
  }

  pub fn current(&self) -> FilterPredicate {
    self.lock().clone()
  }

  /// Shallow-merge `patch` into the current predicate.
  ///
  /// Returns whether the predicate changed. Subscribers are notified
  /// before this returns, and only when something changed.
  pub fn set_filters(&self, patch: FilterPatch) -> AppResult<bool> {
    if patch.page == Some(0) {
      return Err(AppError::validation(Some("page"), "page must be at least 1"));
    }
    if patch.page_size == Some(0) {
      return Err(AppError::validation(
        Some("page_size"),
        "page size must be positive",
      ));
    }

    let updated = {
      let mut current = self.lock();
      let mut next = current.clone();
      patch.category.apply(&mut next.category);
      patch.is_favorite.apply(&mut next.is_favorite);
      patch.status.apply(&mut next.status);
      patch.date_from.apply(&mut next.date_from);
      patch.date_to.apply(&mut next.date_to);
      if let Some(page) = patch.page {
        next.page = page;
      }
      if let Some(page_size) = patch.page_size {
        next.page_size = page_size;
      }

      if next == *current {
        None
      } else {
        *current = next.clone();
        Some(next)
      }
    };

    match updated {
      Some(predicate) => {
        debug!(filters = %predicate.canonical(), "filters updated");
        self.listeners.notify(&predicate);
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Reset to the all-unset predicate.
  pub fn clear_filters(&self) -> bool {
    let changed = {
      let mut current = self.lock();
      if *current == self.initial {
        false
      } else {
        *current = self.initial.clone();
        true
      }
    };
    if changed {
      debug!("filters cleared");
      self.listeners.notify(&self.initial);
    }
    changed
  }

  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&FilterPredicate) + Send + Sync + 'static,
  {
    self.listeners.subscribe(listener)
  }

  /// Step the category filter: unset → each category in turn → unset.
  pub fn cycle_category(&self) -> bool {
    let next = match self.current().category {
      None => Some(NewsCategory::ALL[0]),
      Some(current) => NewsCategory::ALL
        .iter()
        .position(|c| *c == current)
        .and_then(|idx| NewsCategory::ALL.get(idx + 1).copied()),
    };
    self.apply_or_false(FilterPatch {
      category: next.into(),
      page: Some(1),
      ..FilterPatch::default()
    })
  }

  /// Step the status filter: unset → each status in turn → unset.
  pub fn cycle_status(&self) -> bool {
    let next = match self.current().status {
      None => Some(NewsStatus::ALL[0]),
      Some(current) => NewsStatus::ALL
        .iter()
        .position(|s| *s == current)
        .and_then(|idx| NewsStatus::ALL.get(idx + 1).copied()),
    };
    self.apply_or_false(FilterPatch {
      status: next.into(),
      page: Some(1),
      ..FilterPatch::default()
    })
  }

  /// Flip between "favorites only" and no favorite constraint.
  pub fn toggle_favorites_only(&self) -> bool {
    let next = match self.current().is_favorite {
      Some(true) => None,
      _ => Some(true),
    };
    self.apply_or_false(FilterPatch {
      is_favorite: next.into(),
      page: Some(1),
      ..FilterPatch::default()
    })
  }

  pub fn next_page(&self) -> bool {
    let page = self.current().page.saturating_add(1);
    self.apply_or_false(FilterPatch::page(page))
  }

  pub fn prev_page(&self) -> bool {
    let page = self.current().page.saturating_sub(1).max(1);
    self.apply_or_false(FilterPatch::page(page))
  }

  fn apply_or_false(&self, patch: FilterPatch) -> bool {
    self.set_filters(patch).unwrap_or(false)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, FilterPredicate> {
    self.current.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
