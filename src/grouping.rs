use std::collections::BTreeMap;

use crate::api::types::{NewsItem, NewsStatus};

/// Kanban columns keyed by status, in column order.
pub type Columns<'a> = BTreeMap<NewsStatus, Vec<&'a NewsItem>>;

/// Split items into one bucket per status.
///
/// Every status gets a bucket, possibly empty. Items keep their input order
/// within a bucket.
pub fn group_by_status(items: &[NewsItem]) -> Columns<'_> {
  let mut columns: Columns<'_> = NewsStatus::ALL.iter().map(|s| (*s, Vec::new())).collect();
  for item in items {
    columns.entry(item.status).or_default().push(item);
  }
  columns
}
