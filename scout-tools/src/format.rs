use scout_web::SearchResponse;
use serde_json::{Map, Value, json};

/// Compact JSON view of a search response for tool callers.
///
/// Keeps the first `limit` results; `published_date` is rendered as
/// `YYYY-MM-DD`, and `suggestions`, `answers` and `corrections` are omitted
/// when empty.
pub fn format_search_results(resp: &SearchResponse, limit: usize) -> Value {
    let results: Vec<Value> = resp
        .results
        .iter()
        .take(limit)
        .map(|r| {
            let mut item = Map::new();
            item.insert("title".into(), json!(r.title));
            item.insert("url".into(), json!(r.url));
            item.insert("snippet".into(), json!(r.content));
            if let Some(date) = r.published_date {
                item.insert(
                    "published_date".into(),
                    json!(date.format("%Y-%m-%d").to_string()),
                );
            }
            Value::Object(item)
        })
        .collect();

    let mut out = Map::new();
    out.insert("query".into(), json!(resp.query));
    out.insert("total_results".into(), json!(resp.total_results));
    out.insert("results".into(), Value::Array(results));
    for (key, list) in [
        ("suggestions", &resp.suggestions),
        ("answers", &resp.answers),
        ("corrections", &resp.corrections),
    ] {
        if !list.is_empty() {
            out.insert(key.into(), json!(list));
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scout_web::searxng::SearchResult;

    fn result(url: &str, dated: bool) -> SearchResult {
        SearchResult {
            url: url.into(),
            title: format!("title {url}"),
            content: "snippet".into(),
            published_date: dated
                .then(|| Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single())
                .flatten(),
            engine: "duckduckgo".into(),
            category: "general".into(),
            score: 1.0,
            thumbnail: None,
            img_src: None,
            engines: vec!["duckduckgo".into()],
            positions: vec![1],
        }
    }

    fn response(results: Vec<SearchResult>) -> SearchResponse {
        SearchResponse {
            query: "rust".into(),
            total_results: 100,
            results,
            suggestions: Vec::new(),
            answers: vec!["42".into()],
            corrections: Vec::new(),
            infoboxes: Vec::new(),
            unresponsive_engines: Vec::new(),
        }
    }

    #[test]
    fn renders_results_and_optional_lists() {
        let resp = response(vec![result("https://a.example", true), result("https://b.example", false)]);
        let out = format_search_results(&resp, 5);

        assert_eq!(out["query"], "rust");
        assert_eq!(out["total_results"], 100);
        assert_eq!(out["results"][0]["published_date"], "2024-01-15");
        assert_eq!(out["results"][0]["snippet"], "snippet");
        assert!(out["results"][1].get("published_date").is_none());
        assert_eq!(out["answers"], json!(["42"]));
        assert!(out.get("suggestions").is_none());
        assert!(out.get("corrections").is_none());
    }

    #[test]
    fn keeps_first_results_up_to_limit() {
        let resp = response(vec![
            result("https://a.example", false),
            result("https://b.example", false),
            result("https://c.example", false),
        ]);
        let out = format_search_results(&resp, 2);
        let urls: Vec<_> = out["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["url"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }
}
