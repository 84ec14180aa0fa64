use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scout_http::{HttpClient, HttpError, RequestOpts};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{ApiRequest, ApiResponse, SearchResponse, normalize_response};
use crate::rate::{DEFAULT_CAPACITY, DEFAULT_REFILL, RateLimiter};

pub const DEFAULT_LIMIT: u32 = 5;
pub const MAX_LIMIT: u32 = 20;

/// Non-positive limits fall back to the default; large ones are capped.
pub fn clamp_limit(limit: i64) -> u32 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(i64::from(MAX_LIMIT)) as u32
    }
}

pub fn clamp_page(page: i64) -> u32 {
    if page <= 0 {
        1
    } else {
        u32::try_from(page).unwrap_or(u32::MAX)
    }
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid searxng instance URL: {0}")]
    InvalidConfig(String),
    #[error("failed to build search request: {0}")]
    InvalidRequest(String),
    #[error("request timeout: {0}")]
    Timeout(String),
    #[error("search request failed: {0}")]
    RequestFailed(#[source] HttpError),
}

impl From<HttpError> for SearchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Cancelled => SearchError::Timeout("request cancelled".into()),
            HttpError::Timeout(msg) => SearchError::Timeout(msg),
            HttpError::Url(msg) | HttpError::Build(msg) => SearchError::InvalidRequest(msg),
            other => SearchError::RequestFailed(other),
        }
    }
}

// ==============================
// Query
// ==============================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Day,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid time_range: must be one of day, month, year")]
pub struct ParseTimeRangeError;

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(TimeRange::Day),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            _ => Err(ParseTimeRangeError),
        }
    }
}

/// One search call. `limit` and `page` hold what the caller asked for; they
/// are clamped when the request is built.
///
/// ```
/// use scout_web::searxng::{SearchQuery, TimeRange};
///
/// let q = SearchQuery::new("rust borrow checker")
///     .with_limit(50)
///     .with_page(0)
///     .with_time_range(TimeRange::Year)
///     .with_engines(["duckduckgo"]);
///
/// assert_eq!(q.effective_limit(), 20);
/// assert_eq!(q.effective_page(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub limit: i64,
    pub page: i64,
    pub time_range: Option<TimeRange>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub engines: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: i64::from(DEFAULT_LIMIT),
            page: 1,
            time_range: None,
            category: None,
            language: None,
            engines: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engines = engines.into_iter().map(Into::into).collect();
        self
    }

    pub fn effective_limit(&self) -> u32 {
        clamp_limit(self.limit)
    }

    pub fn effective_page(&self) -> u32 {
        clamp_page(self.page)
    }
}

/// How the query reaches the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    /// `GET /search?q=...&format=json`
    #[default]
    QueryString,
    /// `POST /search` with a JSON body.
    JsonBody,
}

// ==============================
// Client
// ==============================

#[derive(Debug, Clone)]
pub struct SearxngConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: usize,
    pub user_agent: String,
    /// Retry `n` waits `n * backoff_step`.
    pub backoff_step: Duration,
    pub rate_capacity: u32,
    pub rate_refill: Duration,
}

impl Default for SearxngConfig {
    fn default() -> Self {
        Self {
            base_url: "https://searxng.example.com".into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            user_agent: format!("scout/{}", env!("CARGO_PKG_VERSION")),
            backoff_step: Duration::from_secs(1),
            rate_capacity: DEFAULT_CAPACITY,
            rate_refill: DEFAULT_REFILL,
        }
    }
}

/// Rate-limited, retrying SearXNG client. Clones share one rate limiter.
#[derive(Debug, Clone)]
pub struct SearxngClient {
    http: HttpClient,
    limiter: Arc<RateLimiter>,
}

impl SearxngClient {
    pub fn new(config: SearxngConfig) -> Result<Self, SearchError> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|e| SearchError::InvalidConfig(format!("{}: {e}", config.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SearchError::InvalidConfig(format!(
                "{}: scheme must be http or https",
                config.base_url
            )));
        }

        let http = HttpClient::new(base.as_str())
            .map_err(|e| SearchError::InvalidConfig(e.to_string()))?
            .with_timeout(config.timeout)
            .with_retries(config.max_retries)
            .with_backoff_step(config.backoff_step)
            .with_user_agent(&config.user_agent)
            .map_err(|e| SearchError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            limiter: Arc::new(RateLimiter::new(config.rate_capacity, config.rate_refill)),
        })
    }

    pub fn base_url(&self) -> &Url {
        self.http.base()
    }

    /// Run one search. Waits for a rate-limit token, sends the request over
    /// `transport` with retries, and normalizes the payload.
    pub async fn search(
        &self,
        query: &SearchQuery,
        transport: Transport,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        self.limiter
            .acquire(cancel)
            .await
            .map_err(|e| SearchError::Timeout(e.to_string()))?;

        let request = ApiRequest::from_query(query);
        tracing::debug!(
            query = %request.q,
            limit = query.effective_limit(),
            page = query.effective_page(),
            ?transport,
            "searxng.search.start"
        );

        let sent = match transport {
            Transport::QueryString => {
                let opts = RequestOpts {
                    query: Some(request.query_pairs()),
                };
                self.http
                    .get_json::<ApiResponse>("search", opts, cancel)
                    .await
            }
            Transport::JsonBody => {
                self.http
                    .post_json::<_, ApiResponse>("search", &request, RequestOpts::default(), cancel)
                    .await
            }
        };

        let raw = match sent {
            Ok(raw) => raw,
            Err(err) => {
                let err = SearchError::from(err);
                tracing::warn!(
                    query = %request.q,
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "searxng.search.failed"
                );
                return Err(err);
            }
        };

        let response = normalize_response(raw);
        tracing::info!(
            query = %request.q,
            results = response.results.len(),
            total_results = response.total_results,
            unresponsive = response.unresponsive_engines.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "searxng.search.done"
        );
        Ok(response)
    }
}
