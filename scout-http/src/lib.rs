//! JSON HTTP client with structured logging, linear-backoff retries and
//! cooperative cancellation.
//!
//! - Request options: headers, query params (repeatable keys), timeout, retries
//! - Every failure except cancellation, deadline expiry and request
//!   construction is retried: network errors, non-2xx statuses and bodies
//!   that fail to decode. Retry `n` waits `n * backoff_step`.
//! - A [`CancellationToken`] is raced against the send, the body read and the
//!   backoff sleep; once it fires the call returns [`HttpError::Cancelled`]
//! - Optional *raw* request/response logging via `SCOUT_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), scout_http::HttpError> {
//! use tokio_util::sync::CancellationToken;
//!
//! let client = scout_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", scout_http::RequestOpts::default(), &CancellationToken::new())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: `tracing` events are emitted for request start, response
//! headers, body snippets (truncated), retries and final errors. Raw request
//! lines (rendered as curl) and raw responses go to target `http.raw` when
//! `SCOUT_HTTP_RAW=1`.

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SCOUT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        if let Ok(s) = std::str::from_utf8(bytes) {
            let mut s = s.to_string();
            if s.len() > RAW_MAX_BODY {
                truncate_at_char_boundary(&mut s, RAW_MAX_BODY);
                s.push('…');
            }
            parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
        } else {
            parts.push(format!("--data-binary @- # ({} bytes)", bytes.len()));
        }
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("HTTP request failed: {0}")]
    Network(String),
    #[error("deadline exceeded: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}, body_snippet: {1}")]
    Decode(String, String),
}

impl HttpError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HttpError::Network(_) | HttpError::Status { .. } | HttpError::Decode(..)
        )
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_builder() {
            HttpError::Build(err.to_string())
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

// ==============================
// Request Options
// ==============================

/// Per-request options. Timeout and retry budget come from the client.
///
/// ```
/// use scout_http::RequestOpts;
/// use std::borrow::Cow;
///
/// let opts = RequestOpts {
///     query: Some(vec![("engines", Cow::Borrowed("ddg")), ("engines", Cow::Borrowed("wiki"))]),
/// };
///
/// assert_eq!(opts.query.as_ref().map(Vec::len), Some(2));
/// assert!(RequestOpts::default().query.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    /// Keys may repeat; each pair becomes one `k=v` in the query string.
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

// ==============================
// Client
// ==============================

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    format!("r{:06}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    user_agent: Option<HeaderValue>,
    pub default_timeout: Duration,
    pub max_retries: usize,
    pub backoff_step: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// Relative request paths are resolved below the base path, so a base of
    /// `https://host/searx` and a path of `search` address `https://host/searx/search`.
    ///
    /// ```
    /// use scout_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 3);
    /// assert_eq!(client.backoff_step, Duration::from_secs(1));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::Url(format!("{base} cannot be used as a base URL")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            user_agent: None,
            default_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_step: Duration::from_secs(1),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Override the per-attempt timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the number of additional attempts after the first.
    ///
    /// ```
    /// use scout_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(5);
    /// assert_eq!(client.max_retries, 5);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Override the linear backoff unit.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Send `User-Agent` on every request. Empty strings disable the header.
    pub fn with_user_agent(mut self, agent: &str) -> Result<Self, HttpError> {
        self.user_agent = if agent.trim().is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_str(agent)
                    .map_err(|e| HttpError::Build(format!("invalid user agent: {e}")))?,
            )
        };
        Ok(self)
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json_internal::<(), T>(Method::GET, path, None, opts, cancel)
            .await
    }

    /// POST a JSON body with per-request options.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json_internal(Method::POST, path, Some(body), opts, cancel)
            .await
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    // ==============================
    // Retry loop
    // ==============================

    async fn request_json_internal<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("failed to serialize request body: {e}")))?;
        let max_retries = self.max_retries;
        let mut attempt = 0usize;

        loop {
            if attempt > 0 {
                let delay = self
                    .backoff_step
                    .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(attempt, "http.retry.cancelled");
                        return Err(HttpError::Cancelled);
                    }
                    _ = sleep(delay) => {}
                }
            }

            let req_id = next_request_id();
            match self
                .send_once::<T>(&method, &url, body.as_deref(), &opts, cancel, &req_id, attempt)
                .await
            {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        backoff_ms=self.backoff_step.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX)).as_millis() as u64,
                        error=%err,
                        "http.retrying"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        req_id=%req_id,
                        attempt = attempt + 1,
                        max_retries,
                        retryable = err.is_retryable(),
                        error=%err,
                        "http.error"
                    );
                    return Err(err);
                }
            }
        }
    }

    // ==============================
    // Single attempt
    // ==============================

    #[allow(clippy::too_many_arguments)]
    async fn send_once<T>(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        opts: &RequestOpts<'_>,
        cancel: &CancellationToken,
        req_id: &str,
        attempt: usize,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }

        let timeout = self.default_timeout;
        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout)
            .header(ACCEPT, "application/json");

        if let Some(agent) = &self.user_agent {
            rb = rb.header(USER_AGENT, agent.clone());
        }
        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(bytes) = body {
            rb = rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }

        let request = rb.build().map_err(HttpError::from_reqwest)?;

        tracing::debug!(
            req_id=%req_id,
            attempt=attempt + 1,
            method=%method,
            host_path=%format!("{}{}", request.url().host_str().unwrap_or("-"), request.url().path()),
            query=?request.url().query(),
            timeout_ms=timeout.as_millis() as u64,
            has_body=%body.is_some(),
            "http.request.start"
        );

        if raw_enabled() {
            let curl = make_curl(method, request.url(), request.headers(), body);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = Instant::now();
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            sent = self.inner.execute(request) => sent.map_err(HttpError::from_reqwest)?,
        };
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            read = resp.bytes() => read.map_err(HttpError::from_reqwest)?,
        };
        let dur_ms = t0.elapsed().as_millis() as u64;

        let upstream_id = headers
            .get("x-request-id")
            .or_else(|| headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            x_request_id=%upstream_id,
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let truncated = bytes.len() > RAW_MAX_BODY;
            let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        let snippet = snip_body(&bytes);
        tracing::trace!(
            req_id=%req_id,
            body_snippet=%snippet,
            "http.response.body_snippet"
        );

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                message: extract_error_message(&bytes),
            });
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            tracing::warn!(
                req_id=%req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e,
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }
}

// ==============================
// Helpers
// ==============================

/// Pull a human-readable message out of an error body. Falls back to a
/// truncated copy of the raw body.
fn extract_error_message(body: &[u8]) -> String {
    // {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).trim().to_string();
    if snip.len() > 500 {
        truncate_at_char_boundary(&mut snip, 500);
        snip.push_str("...");
    }
    snip
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    let mut cut = max.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_gets_trailing_slash() {
        let client = HttpClient::new("https://host.example/searx").unwrap();
        assert_eq!(client.base().as_str(), "https://host.example/searx/");
        let url = client.resolve("search").unwrap();
        assert_eq!(url.as_str(), "https://host.example/searx/search");
    }

    #[test]
    fn leading_slash_stays_under_base() {
        let client = HttpClient::new("https://host.example/searx/").unwrap();
        let url = client.resolve("/search").unwrap();
        assert_eq!(url.as_str(), "https://host.example/searx/search");
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(HttpClient::new(":invalid"), Err(HttpError::Url(_))));
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(
            extract_error_message(br#"{"detail":"engine overloaded"}"#),
            "engine overloaded"
        );
        assert_eq!(
            extract_error_message(b"Internal Server Error"),
            "Internal Server Error"
        );
    }

    #[test]
    fn retry_classification() {
        assert!(HttpError::Network("reset".into()).is_retryable());
        assert!(
            HttpError::Status {
                status: 404,
                message: "Not Found".into()
            }
            .is_retryable()
        );
        assert!(HttpError::Decode("eof".into(), String::new()).is_retryable());
        assert!(!HttpError::Cancelled.is_retryable());
        assert!(!HttpError::Timeout("deadline".into()).is_retryable());
        assert!(!HttpError::Build("bad header".into()).is_retryable());
    }

    #[test]
    fn status_error_mentions_code() {
        let err = HttpError::Status {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let body = "é".repeat(400);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert!(snip.len() <= 503);
    }
}
