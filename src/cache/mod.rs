//! In-memory query caching.
//!
//! - [`QueryCache`] stores one entry per query key with freshness bookkeeping
//! - [`QueryClient`] deduplicates concurrent requests and retries reads
//! - Entries older than the stale time are still served while a refresh runs

mod layer;
mod store;
mod traits;

pub use layer::{QueryClient, RetryPolicy};
pub use store::QueryCache;
pub use traits::{CacheEvent, QueryKey};
