//! Loader for Scout configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files and inline YAML snippets in the
//! order they were attached, then `SCOUT__`-prefixed environment variables
//! (`SCOUT__SEARXNG__BASE_URL` sets `searxng.base_url`). After merging, every
//! string value has `${VAR}` / `$VAR` references expanded from the process
//! environment. Every field has a default, so an empty configuration is valid.
//!
//! ```yaml
//! searxng:
//!   base_url: "https://search.internal"
//!   timeout_secs: 10
//!   max_retries: 2
//!   rate_limit:
//!     capacity: 5
//!     refill_ms: 200
//! reader:
//!   max_redirects: 5
//! logging:
//!   level: debug
//!   format: json
//!   dir: "${HOME}/.local/share/scout"
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SCOUT";

pub const DEFAULT_INSTANCE_URL: &str = "https://searxng.example.com";
pub const DEFAULT_READER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub searxng: SearxngSettings,
    pub reader: ReaderSettings,
    pub logging: LoggingSettings,
}

/// Meta-search backend connection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearxngSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub user_agent: String,
    /// Retry `n` waits `n * backoff_step_ms`.
    pub backoff_step_ms: u64,
    pub rate_limit: RateLimitSettings,
}

impl Default for SearxngSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INSTANCE_URL.into(),
            timeout_secs: 30,
            max_retries: 3,
            user_agent: default_user_agent(),
            backoff_step_ms: 1000,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_ms: 100,
        }
    }
}

/// Page fetcher used by `web_read`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 10,
            user_agent: DEFAULT_READER_USER_AGENT.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormatSetting,
    /// Enables the rolling file sink when set.
    pub dir: Option<String>,
    pub stderr: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormatSetting::Text,
            dir: None,
            stderr: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    #[default]
    Text,
    Json,
}

fn default_user_agent() -> String {
    format!("scout/{}", env!("CARGO_PKG_VERSION"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct ScoutConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for ScoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoutConfigLoader {
    /// Start with no files and `SCOUT__` environment overrides.
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// let config = ScoutConfigLoader::new()
    ///     .with_yaml_str("searxng:\n  max_retries: 1")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.searxng.max_retries, 1);
    /// assert_eq!(config.searxng.timeout_secs, 30);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: ENV_PREFIX.into(),
        }
    }

    /// Use a different environment prefix (tests use this to stay isolated).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use scout_config::{LogFormatSetting, ScoutConfigLoader};
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// searxng:
    ///   base_url: "http://localhost:8888"
    ///   rate_limit:
    ///     capacity: 2
    /// logging:
    ///   format: json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.searxng.base_url, "http://localhost:8888");
    /// assert_eq!(cfg.searxng.rate_limit.capacity, 2);
    /// assert_eq!(cfg.searxng.rate_limit.refill_ms, 100);
    /// assert_eq!(cfg.logging.format, LogFormatSetting::Json);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<ScoutConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
