//! Page reader: fetch one URL and turn its HTML into Markdown.
//!
//! Pipeline: scheme check, GET with browser-like headers (redirects capped),
//! status check, content-type sniff (non-HTML is returned verbatim), removal
//! of `head`, `noscript` and page chrome (`script`, `style`, `nav`, `footer`,
//! `header`, `aside`), `html2md` conversion, then whitespace cleanup.
//! Single attempt, no retries.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use scraper::{Html, Selector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

const STRIPPED_ELEMENTS: &str = "head, script, style, noscript, nav, footer, header, aside";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_BLANK_RUN: usize = 2;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[source] url::ParseError),
    #[error("unsupported URL scheme: {0} (only http and https are supported)")]
    UnsupportedScheme(String),
    #[error("failed to create request: {0}")]
    Build(#[source] reqwest::Error),
    #[error("HTTP request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("request cancelled")]
    Cancelled,
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("failed to convert HTML to Markdown: {0}")]
    Conversion(String),
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
        }
    }
}

/// Stateless apart from the connection pool; share freely.
#[derive(Debug, Clone)]
pub struct PageReader {
    client: Client,
    max_redirects: usize,
}

impl PageReader {
    pub fn new(config: ReaderConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent)
            .build()
            .map_err(ExtractError::Build)?;
        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    /// Fetch `url` and return Markdown, or the raw body for non-HTML content.
    pub async fn fetch_markdown(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let parsed = Url::parse(url.trim()).map_err(ExtractError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let request = self
            .client
            .get(parsed.clone())
            .headers(headers)
            .build()
            .map_err(ExtractError::Build)?;

        tracing::debug!(url = %parsed, "reader.fetch.start");
        let t0 = Instant::now();

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            sent = self.client.execute(request) => sent.map_err(|e| self.classify(e))?,
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %parsed, %status, "reader.fetch.status");
            return Err(ExtractError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            text = resp.text() => text.map_err(|e| {
                if e.is_timeout() { ExtractError::Timeout(e) } else { ExtractError::Body(e) }
            })?,
        };

        if !is_html(&content_type) {
            tracing::info!(
                url = %parsed,
                content_type = %content_type,
                bytes = body.len(),
                duration_ms = t0.elapsed().as_millis() as u64,
                "reader.fetch.passthrough"
            );
            return Ok(body);
        }

        let markdown = tokio::task::spawn_blocking(move || html_to_markdown(&body))
            .await
            .map_err(|e| ExtractError::Conversion(e.to_string()))??;

        tracing::info!(
            url = %parsed,
            markdown_len = markdown.len(),
            duration_ms = t0.elapsed().as_millis() as u64,
            "reader.fetch.done"
        );
        Ok(markdown)
    }

    fn classify(&self, err: reqwest::Error) -> ExtractError {
        if err.is_redirect() {
            ExtractError::TooManyRedirects(self.max_redirects)
        } else if err.is_timeout() {
            ExtractError::Timeout(err)
        } else if err.is_builder() {
            ExtractError::Build(err)
        } else {
            ExtractError::Network(err)
        }
    }
}

fn is_html(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

/// Strip non-content elements and convert the rest to Markdown.
pub fn html_to_markdown(html: &str) -> Result<String, ExtractError> {
    let mut document = Html::parse_document(html);
    let selector = Selector::parse(STRIPPED_ELEMENTS)
        .map_err(|e| ExtractError::Conversion(format!("selector: {e}")))?;

    let doomed: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let markdown = html2md::parse_html(&document.html());
    Ok(clean_markdown(&markdown))
}

/// Trim every line, keep at most two consecutive blank lines, and drop
/// leading and trailing blank lines.
pub fn clean_markdown(markdown: &str) -> String {
    let mut cleaned: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run <= MAX_BLANK_RUN {
                cleaned.push("");
            }
        } else {
            blank_run = 0;
            cleaned.push(trimmed);
        }
    }

    let start = cleaned.iter().position(|l| !l.is_empty()).unwrap_or(cleaned.len());
    let end = cleaned
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(start, |i| i + 1);
    cleaned[start..end].join("\n")
}
