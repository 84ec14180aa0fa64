//! SearXNG meta-search client (`client`) and its wire/result model (`types`).

pub mod client;
pub mod types;

pub use client::{
    ParseTimeRangeError, SearchError, SearchQuery, SearxngClient, SearxngConfig, TimeRange,
    Transport, clamp_limit, clamp_page,
};
pub use types::{
    Infobox, InfoboxImage, InfoboxRelatedTopic, InfoboxUrl, SearchResponse, SearchResult,
    UnresponsiveEngine, normalize_response, parse_published_date,
};
