//! Query keys for backend reads.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;
use crate::filters::FilterPredicate;

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for backend API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NewsQueryKey {
  /// One page of the user's news, narrowed by a filter predicate
  NewsPage(FilterPredicate),
  /// One page of the public feed; only category and pagination count
  PublicPage(FilterPredicate),
  /// Per-status counters
  Stats,
  /// The signed-in user's profile
  Profile,
}

impl NewsQueryKey {
  /// Serialized form that gets hashed
  fn canonical(&self) -> String {
    match self {
      Self::NewsPage(predicate) => format!("news?{}", predicate.canonical()),
      Self::PublicPage(predicate) => format!("public?{}", predicate.public_scope().canonical()),
      Self::Stats => "news_stats".to_string(),
      Self::Profile => "profile".to_string(),
    }
  }
}

impl QueryKey for NewsQueryKey {
  fn cache_hash(&self) -> String {
    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::NewsPage(predicate) if predicate.is_constrained() => {
        format!("news page {}: {}", predicate.page, predicate.canonical())
      }
      Self::NewsPage(predicate) => format!("news page {}", predicate.page),
      Self::PublicPage(predicate) => format!("public page {}", predicate.page),
      Self::Stats => "news stats".to_string(),
      Self::Profile => "profile".to_string(),
    }
  }
}
