use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use scout_common::observability::{LogConfig, LogFormat};
use scout_config::{LogFormatSetting, ScoutConfig, ScoutConfigLoader};
use scout_tools::{WebTools, tool_definitions};
use scout_web::searxng::{SearchQuery, SearchResponse, Transport};
use scout_web::{PageReader, ReaderConfig, SearxngClient, SearxngConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};

const DEFAULT_CONFIG_FILE: &str = "scout.yaml";
const SNIPPET_WIDTH: usize = 80;

/// Config file (explicit path or optional `./scout.yaml`), env overlay, then CLI flags.
pub fn load_config(cli: &Cli) -> Result<ScoutConfig> {
    let loader = match &cli.config {
        Some(path) => ScoutConfigLoader::new().with_file(path),
        None => ScoutConfigLoader::new().with_optional_file(PathBuf::from(DEFAULT_CONFIG_FILE)),
    };
    let mut cfg = loader.load().context("failed to load configuration")?;

    if let Some(url) = &cli.instance_url {
        cfg.searxng.base_url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        cfg.searxng.timeout_secs = secs;
        cfg.reader.timeout_secs = secs;
    }
    if let Some(level) = &cli.log_level {
        cfg.logging.level = level.clone();
    }
    if cli.log_json {
        cfg.logging.format = LogFormatSetting::Json;
    }
    Ok(cfg)
}

pub fn log_config(cfg: &ScoutConfig) -> LogConfig {
    LogConfig {
        app_name: "scout",
        log_dir: cfg.logging.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.logging.stderr,
        format: match cfg.logging.format {
            LogFormatSetting::Text => LogFormat::Text,
            LogFormatSetting::Json => LogFormat::Json,
        },
        default_filter: cfg.logging.level.clone(),
    }
}

pub fn searxng_config(cfg: &ScoutConfig) -> SearxngConfig {
    let s = &cfg.searxng;
    SearxngConfig {
        base_url: s.base_url.clone(),
        timeout: Duration::from_secs(s.timeout_secs),
        max_retries: s.max_retries,
        user_agent: s.user_agent.clone(),
        backoff_step: Duration::from_millis(s.backoff_step_ms),
        rate_capacity: s.rate_limit.capacity,
        rate_refill: Duration::from_millis(s.rate_limit.refill_ms),
    }
}

pub fn reader_config(cfg: &ScoutConfig) -> ReaderConfig {
    ReaderConfig {
        timeout: Duration::from_secs(cfg.reader.timeout_secs),
        max_redirects: cfg.reader.max_redirects,
        user_agent: cfg.reader.user_agent.clone(),
    }
}

pub async fn run(command: Commands, cfg: &ScoutConfig, cancel: &CancellationToken) -> Result<ExitCode> {
    match command {
        Commands::Search {
            query,
            limit,
            page,
            time_range,
            category,
            language,
            engines,
            post,
            json,
        } => {
            let client = SearxngClient::new(searxng_config(cfg))
                .context("failed to create searxng client")?;
            tracing::debug!(instance_url = %client.base_url(), "app.search");

            let mut q = SearchQuery::new(query)
                .with_limit(limit)
                .with_page(page)
                .with_engines(engines);
            if let Some(range) = time_range {
                q = q.with_time_range(range);
            }
            if let Some(category) = category {
                q = q.with_category(category);
            }
            if let Some(language) = language {
                q = q.with_language(language);
            }
            let transport = if post { Transport::JsonBody } else { Transport::QueryString };

            let mut resp = client
                .search(&q, transport, cancel)
                .await
                .context("search failed")?;

            if json {
                resp.results.truncate(q.effective_limit() as usize);
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                print!("{}", render_search(&resp, q.effective_limit(), q.effective_page()));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Read { url } => {
            let reader = PageReader::new(reader_config(cfg)).context("failed to create page reader")?;
            let markdown = reader
                .fetch_markdown(&url, cancel)
                .await
                .with_context(|| format!("failed to fetch {url}"))?;
            println!("{markdown}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tool { name, args } => {
            let args: Value = serde_json::from_str(&args).context("--args must be a JSON object")?;
            let tools = WebTools::new(
                SearxngClient::new(searxng_config(cfg)).context("failed to create searxng client")?,
                PageReader::new(reader_config(cfg)).context("failed to create page reader")?,
            );
            let out = tools.call(&name, &args, cancel).await;
            println!("{}", out.text);
            Ok(if out.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Human-readable listing of the first `limit` results.
pub fn render_search(resp: &SearchResponse, limit: u32, page: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nQuery: {}", resp.query);
    let _ = writeln!(out, "Total results: {}\n", resp.total_results);

    if resp.results.is_empty() {
        out.push_str("No results found.\n");
        return out;
    }

    for (i, r) in resp.results.iter().take(limit as usize).enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, r.title);
        if !r.content.is_empty() {
            let _ = writeln!(out, "   {}", truncate_snippet(&r.content, SNIPPET_WIDTH));
        }
        let _ = writeln!(out, "   {}\n", r.url);
    }

    if !resp.suggestions.is_empty() {
        let _ = writeln!(out, "Suggestions: {}", resp.suggestions.join(", "));
    }
    if !resp.answers.is_empty() {
        out.push_str("Answers:\n");
        for answer in &resp.answers {
            let _ = writeln!(out, "  - {answer}");
        }
    }
    if !resp.corrections.is_empty() {
        let _ = writeln!(out, "Did you mean: {}?", resp.corrections.join(", "));
    }

    if resp.total_results > u64::from(limit) * u64::from(page) {
        let next = page + 1;
        let _ = writeln!(out, "\n-- More results available (page {next}) --");
        let _ = writeln!(out, "Run: scout search {:?} --page {next}", resp.query);
    }
    out
}

fn truncate_snippet(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use scout_web::searxng::SearchResult;

    fn result(n: usize, content: &str) -> SearchResult {
        SearchResult {
            url: format!("https://example.com/{n}"),
            title: format!("Result {n}"),
            content: content.into(),
            published_date: None,
            engine: "duckduckgo".into(),
            category: "general".into(),
            score: 1.0,
            thumbnail: None,
            img_src: None,
            engines: Vec::new(),
            positions: Vec::new(),
        }
    }

    fn response(total: u64, results: Vec<SearchResult>) -> SearchResponse {
        SearchResponse {
            query: "rust".into(),
            total_results: total,
            results,
            suggestions: vec!["rust lang".into()],
            answers: Vec::new(),
            corrections: Vec::new(),
            infoboxes: Vec::new(),
            unresponsive_engines: Vec::new(),
        }
    }

    #[test]
    fn listing_numbers_results_and_hints_next_page() {
        let long = "x".repeat(120);
        let resp = response(50, vec![result(1, "short"), result(2, &long), result(3, "")]);
        let text = render_search(&resp, 2, 1);

        assert!(text.contains("1. Result 1\n   short\n   https://example.com/1"));
        assert!(text.contains(&format!("   {}...\n", "x".repeat(77))));
        assert!(!text.contains("Result 3"));
        assert!(text.contains("Suggestions: rust lang"));
        assert!(text.contains("-- More results available (page 2) --"));
        assert!(text.contains("Run: scout search \"rust\" --page 2"));
    }

    #[test]
    fn no_hint_on_last_page() {
        let resp = response(4, vec![result(1, "a")]);
        let text = render_search(&resp, 5, 1);
        assert!(!text.contains("More results"));
    }

    #[test]
    fn empty_listing() {
        let resp = response(0, Vec::new());
        assert!(render_search(&resp, 5, 1).contains("No results found."));
    }

    #[test]
    fn snippet_truncation_counts_chars() {
        assert_eq!(truncate_snippet("héllo", 80), "héllo");
        let s = "é".repeat(90);
        let cut = truncate_snippet(&s, 80);
        assert_eq!(cut.chars().count(), 80);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn config_maps_onto_clients() {
        let cfg = ScoutConfig::default();
        let search = searxng_config(&cfg);
        assert_eq!(search.timeout, Duration::from_secs(30));
        assert_eq!(search.max_retries, 3);
        assert_eq!(search.rate_capacity, 10);
        assert_eq!(search.rate_refill, Duration::from_millis(100));
        assert_eq!(reader_config(&cfg).max_redirects, 10);
        assert_eq!(log_config(&cfg).format, LogFormat::Text);
    }

    #[test]
    fn cli_flags_override_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.yaml");
        std::fs::write(&path, "searxng:\n  base_url: \"http://from-file\"\n  timeout_secs: 9\n").unwrap();

        let cli = Cli::try_parse_from([
            "scout",
            "--config",
            path.to_str().unwrap(),
            "--instance-url",
            "http://from-flag",
            "--timeout",
            "4",
            "--log-json",
            "tools",
        ])
        .unwrap();
        let cfg = load_config(&cli).unwrap();

        assert_eq!(cfg.searxng.base_url, "http://from-flag");
        assert_eq!(cfg.searxng.timeout_secs, 4);
        assert_eq!(cfg.reader.timeout_secs, 4);
        assert_eq!(cfg.logging.format, LogFormatSetting::Json);
    }
}
