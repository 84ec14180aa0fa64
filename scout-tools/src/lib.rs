//! Tool boundary for agents: `web_search` and `web_read`.
//!
//! Every call resolves to a [`ToolOutput`]. Bad arguments and backend
//! failures become error outputs with a short message rather than an `Err`,
//! so the caller always has something to hand back to the agent.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use scout_tools::WebTools;
//! use scout_web::{PageReader, ReaderConfig, SearxngClient, SearxngConfig};
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! let tools = WebTools::new(
//!     SearxngClient::new(SearxngConfig::default())?,
//!     PageReader::new(ReaderConfig::default())?,
//! );
//! let out = tools
//!     .call("web_search", &json!({"query": "tokio select"}), &CancellationToken::new())
//!     .await;
//! println!("{}", out.text);
//! # Ok(()) }
//! ```

pub mod definitions;
pub mod format;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use scout_web::searxng::{SearchQuery, TimeRange, Transport};
use scout_web::{ExtractError, PageReader, SearxngClient};

pub use definitions::{ToolDefinition, WEB_READ, WEB_SEARCH, tool_definitions};
pub use format::format_search_results;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebTools {
    search: SearxngClient,
    reader: PageReader,
    transport: Transport,
}

impl WebTools {
    pub fn new(search: SearxngClient, reader: PageReader) -> Self {
        Self {
            search,
            reader,
            transport: Transport::QueryString,
        }
    }

    /// Send `web_search` queries as JSON POST bodies instead of GET params.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Dispatch by tool name. `args` must be a JSON object or `null`.
    pub async fn call(&self, name: &str, args: &Value, cancel: &CancellationToken) -> ToolOutput {
        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return ToolOutput::error("invalid arguments format"),
        };

        let out = match name {
            WEB_SEARCH => self.web_search(args, cancel).await,
            WEB_READ => self.web_read(args, cancel).await,
            other => ToolOutput::error(format!("unknown tool: {other}")),
        };
        tracing::debug!(tool = name, is_error = out.is_error, "tools.call.done");
        out
    }

    pub async fn web_search(&self, args: &Map<String, Value>, cancel: &CancellationToken) -> ToolOutput {
        let query = match parse_search_args(args) {
            Ok(query) => query,
            Err(msg) => return ToolOutput::error(msg),
        };

        tracing::info!(query = %query.query, limit = query.effective_limit(), page = query.effective_page(), "tools.web_search");
        let resp = match self.search.search(&query, self.transport, cancel).await {
            Ok(resp) => resp,
            Err(e) => return ToolOutput::error(format!("search failed: {e}")),
        };

        let formatted = format_search_results(&resp, query.effective_limit() as usize);
        match serde_json::to_string_pretty(&formatted) {
            Ok(text) => ToolOutput::text(text),
            Err(e) => ToolOutput::error(format!("failed to format results: {e}")),
        }
    }

    pub async fn web_read(&self, args: &Map<String, Value>, cancel: &CancellationToken) -> ToolOutput {
        let Some(url) = non_empty_str(args, "url") else {
            return ToolOutput::error("url is required");
        };

        tracing::info!(url, "tools.web_read");
        match self.reader.fetch_markdown(url, cancel).await {
            Ok(markdown) => ToolOutput::text(markdown),
            Err(e @ (ExtractError::InvalidUrl(_) | ExtractError::UnsupportedScheme(_))) => {
                ToolOutput::error(e.to_string())
            }
            Err(e) => ToolOutput::error(format!("failed to fetch URL: {e}")),
        }
    }
}

fn non_empty_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numbers arrive as JSON floats; fractions are truncated and other types ignored.
fn integer_arg(args: &Map<String, Value>, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_f64).map(|f| f.trunc() as i64)
}

fn parse_search_args(args: &Map<String, Value>) -> Result<SearchQuery, String> {
    let query = non_empty_str(args, "query").ok_or("query is required")?;
    let mut q = SearchQuery::new(query);
    if let Some(limit) = integer_arg(args, "limit") {
        q = q.with_limit(limit);
    }
    if let Some(page) = integer_arg(args, "page") {
        q = q.with_page(page);
    }
    if let Some(range) = non_empty_str(args, "time_range") {
        q = q.with_time_range(range.parse::<TimeRange>().map_err(|e| e.to_string())?);
    }
    if let Some(category) = non_empty_str(args, "category") {
        q = q.with_category(category);
    }
    Ok(q)
}
