//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{EtlConfig, Overrides};

pub mod graph;
pub mod load;

/// Hospital graph ETL - load the hospital CSV snapshot into Neo4j
#[derive(Parser)]
#[command(name = "hospital-etl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "HOSPITAL_ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the CSV sources into Neo4j (idempotent)
    Load(load::LoadArgs),

    /// Delete the whole graph, then load the CSV sources
    Reset(load::ResetArgs),

    /// Parse the sources and dry-run the load in memory
    Check(load::LoadArgs),

    /// Show node and relationship counts
    Status,

    /// Find nodes of one label
    Find(graph::FindArgs),

    /// Show the nodes directly connected to one node
    Explore(graph::ExploreArgs),

    /// Visits per hospital and the most common diagnoses
    Stats(graph::StatsArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = EtlConfig::resolve(self.config.as_deref(), &self.overrides)?;
        let json = self.json;

        match self.command {
            Commands::Load(args) => load::cmd_load(&config, args, json).await,
            Commands::Reset(args) => load::cmd_reset(&config, args, json).await,
            Commands::Check(args) => load::cmd_check(&config, args, json).await,
            Commands::Status => graph::execute(&config, graph::Query::Status, json).await,
            Commands::Find(args) => graph::execute(&config, graph::Query::Find(args), json).await,
            Commands::Explore(args) => graph::execute(&config, graph::Query::Explore(args), json).await,
            Commands::Stats(args) => graph::execute(&config, graph::Query::Stats(args), json).await,
        }
    }
}
