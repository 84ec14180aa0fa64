use std::time::Duration;

use scout_tools::{ToolOutput, WebTools};
use scout_web::{PageReader, ReaderConfig, SearxngClient, SearxngConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tools_for(base_url: String) -> WebTools {
    let search = SearxngClient::new(SearxngConfig {
        base_url,
        max_retries: 0,
        timeout: Duration::from_secs(5),
        backoff_step: Duration::from_millis(5),
        ..Default::default()
    })
    .expect("valid search config");
    let reader = PageReader::new(ReaderConfig::default()).expect("reader builds");
    WebTools::new(search, reader)
}

async fn call(tools: &WebTools, name: &str, args: Value) -> ToolOutput {
    tools.call(name, &args, &CancellationToken::new()).await
}

#[tokio::test]
async fn missing_query_is_a_tool_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(&tools, "web_search", json!({})).await;
    assert!(out.is_error);
    assert!(out.text.contains("query is required"));

    let out = call(&tools, "web_search", Value::Null).await;
    assert_eq!(out, ToolOutput::error("query is required"));
}

#[tokio::test]
async fn search_returns_formatted_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("time_range", "month"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "rust",
            "number_of_results": 3,
            "results": [
                {"url": "https://a.example", "title": "A", "content": "first", "publishedDate": "2024-02-03 04:05:06"},
                {"url": "https://b.example", "title": "B", "content": "second"},
                {"url": "https://c.example", "title": "C", "content": "third"}
            ],
            "corrections": ["rust-lang"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(
        &tools,
        "web_search",
        json!({"query": "rust", "limit": 2, "time_range": "month"}),
    )
    .await;
    assert!(!out.is_error, "{}", out.text);

    let parsed: Value = serde_json::from_str(&out.text).unwrap();
    assert_eq!(parsed["total_results"], 3);
    assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["results"][0]["published_date"], "2024-02-03");
    assert_eq!(parsed["corrections"], json!(["rust-lang"]));
    assert!(parsed.get("answers").is_none());
}

#[tokio::test]
async fn backend_failure_is_prefixed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(&tools, "web_search", json!({"query": "rust"})).await;
    assert!(out.is_error);
    assert!(out.text.starts_with("search failed: "), "{}", out.text);
    assert!(out.text.contains("500"));
}

#[tokio::test]
async fn invalid_time_range_is_rejected_before_searching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(&tools, "web_search", json!({"query": "rust", "time_range": "week"})).await;
    assert!(out.is_error);
    assert!(out.text.contains("invalid time_range"));
}

#[tokio::test]
async fn read_requires_url() {
    let tools = tools_for("http://127.0.0.1:9".into());
    for args in [json!({}), json!({"url": ""}), json!({"url": 42})] {
        let out = call(&tools, "web_read", args).await;
        assert_eq!(out, ToolOutput::error("url is required"));
    }
}

#[tokio::test]
async fn read_reports_scheme_and_syntax_errors() {
    let tools = tools_for("http://127.0.0.1:9".into());

    let out = call(&tools, "web_read", json!({"url": "ftp://example.com"})).await;
    assert!(out.is_error);
    assert!(out.text.contains("unsupported URL scheme"));

    let out = call(&tools, "web_read", json!({"url": "::nope"})).await;
    assert!(out.is_error);
    assert!(out.text.contains("invalid URL"));
}

#[tokio::test]
async fn read_returns_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><nav>Menu</nav><h1>Title</h1><p>Paragraph text.</p></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(&tools, "web_read", json!({"url": format!("{}/post", server.uri())})).await;
    assert!(!out.is_error, "{}", out.text);
    assert!(out.text.contains("Title"));
    assert!(out.text.contains("Paragraph text."));
    assert!(!out.text.contains("Menu"));
}

#[tokio::test]
async fn read_failure_is_prefixed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let tools = tools_for(server.uri());

    let out = call(&tools, "web_read", json!({"url": format!("{}/down", server.uri())})).await;
    assert!(out.is_error);
    assert_eq!(out.text, "failed to fetch URL: HTTP 503: Service Unavailable");
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments() {
    let tools = tools_for("http://127.0.0.1:9".into());

    let out = call(&tools, "web_crawl", json!({})).await;
    assert_eq!(out, ToolOutput::error("unknown tool: web_crawl"));

    let out = call(&tools, "web_search", json!(["rust"])).await;
    assert_eq!(out, ToolOutput::error("invalid arguments format"));
}
