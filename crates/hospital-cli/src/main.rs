//! hospital-etl - Hospital graph loader
//!
//! Loads the hospital CSV snapshot into Neo4j and inspects the loaded graph.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::Cli;

/// Initialize tracing with optional file logging.
///
/// Console output goes to stderr so `--json` output on stdout stays clean.
fn init_tracing(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "hospital_etl=debug,hospital_graph=debug,hospital_core=debug"
    } else {
        "hospital_etl=info,hospital_graph=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        // Mirror everything to the file when --log-file is used
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_file.as_deref(), cli.verbose)?;

    cli.execute().await
}
