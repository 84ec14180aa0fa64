//! Shared plumbing for the Scout crates.
//!
//! Today this is the tracing bootstrap in [`observability`]; binaries and
//! integration tests call [`observability::init_logging`] once near startup.
//!
//! ```rust
//! use scout_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.default_filter, "info");
//! assert!(cfg.log_dir.is_none());
//! ```

pub mod observability;
