//! Load, reset and dry-run commands.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use hospital_core::Dataset;
use hospital_graph::{check_sources, graph_counts, GraphLoader, LoadReport};

use crate::config::EtlConfig;
use crate::output;

#[derive(Args)]
pub struct LoadArgs {
    /// Exit with an error if any source row was skipped
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Confirm destructive operation
    #[arg(long)]
    pub confirm: bool,

    /// Exit with an error if any source row was skipped
    #[arg(long)]
    pub strict: bool,
}

fn loader(config: &EtlConfig) -> GraphLoader<hospital_graph::GraphConfig> {
    GraphLoader::new(config.graph.clone(), config.retry.policy())
}

/// Load the sources into Neo4j.
pub async fn cmd_load(config: &EtlConfig, args: LoadArgs, json: bool) -> Result<()> {
    if !json {
        println!("{} {}", "Loading hospital graph into".bold(), config.graph.uri.cyan());
    }

    let report = loader(config).run_full_load(&config.sources).await?;
    finish(&report, "Load complete", args.strict, json)
}

/// Wipe the graph and reload it.
pub async fn cmd_reset(config: &EtlConfig, args: ResetArgs, json: bool) -> Result<()> {
    if !args.confirm {
        println!("{}", "This will delete every node and relationship in the database!".red().bold());
        println!("Run with {} to confirm.", "--confirm".bold());
        return Ok(());
    }

    if !json {
        println!("{} {}", "Resetting hospital graph in".red().bold(), config.graph.uri.cyan());
    }

    let report = loader(config).run_full_reset(&config.sources).await?;
    finish(&report, "Reset complete", args.strict, json)
}

/// Parse the sources and load them into an in-memory graph.
pub async fn cmd_check(config: &EtlConfig, args: LoadArgs, json: bool) -> Result<()> {
    let dataset = Dataset::load(&config.sources)?;
    let (report, graph) = check_sources(&dataset).await?;

    if json {
        return finish(&report, "Check complete", args.strict, json);
    }

    println!("{}", "Source check (no database writes)".bold());
    output::print_counts(&graph_counts(&graph).await?);
    finish(&report, "Check complete", args.strict, json)
}

fn finish(report: &LoadReport, title: &str, strict: bool, json: bool) -> Result<()> {
    if json {
        output::print_json(report)?;
    } else {
        output::print_report(report, title);
    }

    if strict && !report.is_clean() {
        bail!(
            "{} source row(s) were skipped ({} issue(s))",
            report.skipped_rows(),
            report.issue_count()
        );
    }
    Ok(())
}
