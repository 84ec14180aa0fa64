use clap::{Parser, Subcommand};
use scout_web::searxng::TimeRange;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "scout")]
#[command(about = "scout - SearXNG meta-search and page reader for agents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML config file (defaults to ./scout.yaml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// SearXNG instance URL (overrides config file)
    #[arg(long, global = true, env = "SEARXNG_INSTANCE_URL")]
    pub instance_url: Option<String>,

    /// Request timeout in seconds for search and page reads
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log filter, e.g. `debug` or `scout_http=trace` (RUST_LOG still wins)
    #[arg(short = 'l', long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search the web through SearXNG and print a numbered listing
    Search {
        query: String,

        /// Number of results to show (1-20)
        #[arg(short = 'n', long, default_value_t = 5, allow_negative_numbers = true)]
        limit: i64,

        /// Page number for pagination
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,

        /// Time range filter: day, month, year
        #[arg(long)]
        time_range: Option<TimeRange>,

        /// Search category: general, images, videos, news, it, science, ...
        #[arg(long)]
        category: Option<String>,

        /// Language code, e.g. `en` or `fr`
        #[arg(long)]
        language: Option<String>,

        /// Restrict to an engine (can be repeated)
        #[arg(short, long = "engine")]
        engines: Vec<String>,

        /// Send the query as a JSON POST body instead of GET parameters
        #[arg(long)]
        post: bool,

        /// Print the normalized response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a URL and print it as Markdown
    Read { url: String },

    /// Invoke a tool the way an agent would
    Tool {
        /// Tool name (`web_search` or `web_read`)
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Print tool definitions as JSON
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_flags() {
        let cli = Cli::try_parse_from([
            "scout",
            "search",
            "rust async",
            "--limit",
            "3",
            "--page",
            "2",
            "--time-range",
            "month",
            "-e",
            "duckduckgo",
            "-e",
            "wikipedia",
            "--post",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query,
                limit,
                page,
                time_range,
                engines,
                post,
                ..
            } => {
                assert_eq!(query, "rust async");
                assert_eq!(limit, 3);
                assert_eq!(page, 2);
                assert_eq!(time_range, Some(TimeRange::Month));
                assert_eq!(engines, vec!["duckduckgo", "wikipedia"]);
                assert!(post);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_time_range() {
        let res = Cli::try_parse_from(["scout", "search", "x", "--time-range", "week"]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "scout",
            "read",
            "https://example.com",
            "--instance-url",
            "http://localhost:8888",
            "--timeout",
            "5",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.instance_url.as_deref(), Some("http://localhost:8888"));
        assert_eq!(cli.timeout, Some(5));
        assert!(cli.log_json);
    }

    #[test]
    fn tool_args_default_to_empty_object() {
        let cli = Cli::try_parse_from(["scout", "tool", "web_read"]).unwrap();
        match cli.command {
            Commands::Tool { name, args } => {
                assert_eq!(name, "web_read");
                assert_eq!(args, "{}");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
