//! Backend REST API: wire types, query keys and the HTTP client.

pub mod api_types;
pub mod cache;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

pub use cache::NewsQueryKey;
pub use client::{ApiClient, NewsBackend, StaticToken};
