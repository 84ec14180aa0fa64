//! Web search and page reading.
//!
//! - SearXNG meta-search client with client-side pacing (`searxng`, `rate`)
//! - Page fetch + HTML to Markdown conversion (`extract`)

pub mod extract;
pub mod rate;
pub mod searxng;

pub use extract::{ExtractError, PageReader, ReaderConfig};
pub use rate::{RateLimitCancelled, RateLimiter};
pub use searxng::{SearchError, SearchQuery, SearchResponse, SearxngClient, SearxngConfig, Transport};
