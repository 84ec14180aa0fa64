use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use scout_common::observability::init_logging;
use tokio_util::sync::CancellationToken;

mod app;
mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1) Load config (file, then env, then flags)
    let cfg = app::load_config(&cli)?;

    // 2) Logging goes to stderr/file; stdout carries results
    let log_guard = init_logging(app::log_config(&cfg))?;
    if let Some(path) = log_guard.log_path() {
        tracing::debug!(path = %path.display(), "app.log_file");
    }

    // 3) Ctrl-C cancels whatever is in flight
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("app.interrupted");
            on_interrupt.cancel();
        }
    });

    app::run(cli.command, &cfg, &cancel).await
}
