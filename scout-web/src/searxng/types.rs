//! SearXNG wire schema and the normalized result model.
//!
//! The `Api*` types mirror `/search?format=json` loosely: every field is
//! optional and a few fields accept more than one shape. [`normalize_response`]
//! maps them onto [`SearchResponse`], where absent sequences become empty
//! vectors and result order is preserved.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

use super::client::{SearchQuery, clamp_page};

// ==============================
// Request
// ==============================

/// Request fields shared by both transports. Serialized as the POST body and
/// flattened into query pairs for GET.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Only sent past the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pageno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<&'static str>,
    pub format: &'static str,
}

impl ApiRequest {
    pub fn from_query(query: &SearchQuery) -> Self {
        let page = clamp_page(query.page);
        Self {
            q: query.query.clone(),
            category: non_empty(query.category.as_deref()),
            engines: query
                .engines
                .iter()
                .filter(|e| !e.trim().is_empty())
                .cloned()
                .collect(),
            language: non_empty(query.language.as_deref()),
            // SearXNG treats a missing pageno as page 1
            pageno: (page > 1).then_some(page),
            time_range: query.time_range.map(|t| t.as_str()),
            format: "json",
        }
    }

    /// Query-string form; `engines` repeats once per engine.
    pub fn query_pairs(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        let mut pairs = vec![
            ("q", Cow::Borrowed(self.q.as_str())),
            ("format", Cow::Borrowed(self.format)),
        ];
        if let Some(category) = &self.category {
            pairs.push(("category", Cow::Borrowed(category.as_str())));
        }
        if let Some(language) = &self.language {
            pairs.push(("language", Cow::Borrowed(language.as_str())));
        }
        if let Some(pageno) = self.pageno {
            pairs.push(("pageno", Cow::Owned(pageno.to_string())));
        }
        if let Some(time_range) = self.time_range {
            pairs.push(("time_range", Cow::Borrowed(time_range)));
        }
        for engine in &self.engines {
            pairs.push(("engines", Cow::Borrowed(engine.as_str())));
        }
        pairs
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// ==============================
// Wire response
// ==============================

#[derive(Debug, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub number_of_results: Option<f64>,
    #[serde(default)]
    pub results: Option<Vec<ApiResult>>,
    #[serde(default)]
    pub answers: Option<Vec<ApiAnswer>>,
    #[serde(default)]
    pub corrections: Option<Vec<String>>,
    #[serde(default)]
    pub infoboxes: Option<Vec<Infobox>>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
    #[serde(default)]
    pub unresponsive_engines: Option<Vec<ApiUnresponsiveEngine>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "publishedDate")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub img_src: Option<String>,
    #[serde(default)]
    pub engines: Option<Vec<String>>,
    #[serde(default)]
    pub positions: Option<Vec<u32>>,
}

/// Answers arrive as bare strings or as objects carrying the text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiAnswer {
    Text(String),
    Object {
        #[serde(default)]
        answer: Option<String>,
    },
}

/// SearXNG reports `[name, error]` pairs; some proxies rewrite them to objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiUnresponsiveEngine {
    Pair(Option<String>, Option<String>),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Explicit `null` takes the field's default, the same as a missing key.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

// ==============================
// Normalized model
// ==============================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: u64,
    pub results: Vec<SearchResult>,
    pub suggestions: Vec<String>,
    pub answers: Vec<String>,
    pub corrections: Vec<String>,
    pub infoboxes: Vec<Infobox>,
    pub unresponsive_engines: Vec<UnresponsiveEngine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_date: Option<DateTime<Utc>>,
    pub engine: String,
    pub category: String,
    pub score: f64,
    pub thumbnail: Option<String>,
    pub img_src: Option<String>,
    pub engines: Vec<String>,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresponsiveEngine {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Infobox {
    /// SearXNG names this field `infobox`.
    #[serde(alias = "infobox", deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub engine: String,
    #[serde(deserialize_with = "null_as_default")]
    pub attribution: String,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<InfoboxImage>,
    #[serde(rename = "relatedTopics", deserialize_with = "null_as_default")]
    pub related_topics: Vec<InfoboxRelatedTopic>,
    #[serde(deserialize_with = "null_as_default")]
    pub urls: Vec<InfoboxUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoboxImage {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub alt: String,
    #[serde(rename = "thumbnailUrl", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoboxRelatedTopic {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoboxUrl {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_src: Option<String>,
}

// ==============================
// Normalization
// ==============================

pub fn normalize_response(raw: ApiResponse) -> SearchResponse {
    SearchResponse {
        query: raw.query.unwrap_or_default(),
        total_results: raw
            .number_of_results
            .filter(|n| n.is_finite() && *n > 0.0)
            .map(|n| n as u64)
            .unwrap_or(0),
        results: raw
            .results
            .unwrap_or_default()
            .into_iter()
            .map(normalize_result)
            .collect(),
        suggestions: raw.suggestions.unwrap_or_default(),
        answers: raw
            .answers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| match a {
                ApiAnswer::Text(text) => Some(text),
                ApiAnswer::Object { answer } => answer,
            })
            .collect(),
        corrections: raw.corrections.unwrap_or_default(),
        infoboxes: raw.infoboxes.unwrap_or_default(),
        unresponsive_engines: raw
            .unresponsive_engines
            .unwrap_or_default()
            .into_iter()
            .map(|e| match e {
                ApiUnresponsiveEngine::Pair(name, error)
                | ApiUnresponsiveEngine::Object { name, error } => UnresponsiveEngine {
                    name: name.unwrap_or_default(),
                    error: error.unwrap_or_default(),
                },
            })
            .collect(),
    }
}

pub fn normalize_result(raw: ApiResult) -> SearchResult {
    SearchResult {
        url: raw.url.unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        content: raw.content.unwrap_or_default(),
        published_date: raw.published_date.as_deref().and_then(parse_published_date),
        engine: raw.engine.unwrap_or_default(),
        category: raw.category.unwrap_or_default(),
        score: raw.score.unwrap_or(0.0),
        thumbnail: raw.thumbnail.filter(|s| !s.is_empty()),
        img_src: raw.img_src.filter(|s| !s.is_empty()),
        engines: raw.engines.unwrap_or_default(),
        positions: raw.positions.unwrap_or_default(),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`, in that order. Zone-less values are taken as UTC.
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
