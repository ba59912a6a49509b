//! Read-only graph commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::warn;

use hospital_core::NodeKind;
use hospital_graph::{
    find_nodes, graph_counts, neighbours, top_diagnoses, visits_per_hospital, GraphClient, GraphStore,
};

use crate::config::EtlConfig;
use crate::output;

#[derive(Args)]
pub struct FindArgs {
    /// Node label (hospital, payer, physician, patient, visit, review)
    pub kind: NodeKind,

    /// Filter as field=value or field~text; repeatable
    #[arg(short = 'w', long = "where")]
    pub filters: Vec<String>,

    /// Maximum number of nodes
    #[arg(long, default_value = "25")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ExploreArgs {
    /// Node label
    pub kind: NodeKind,
    /// Node id
    pub id: i64,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Number of diagnoses to list
    #[arg(long, default_value = "10")]
    pub top: usize,
}

pub enum Query {
    Status,
    Find(FindArgs),
    Explore(ExploreArgs),
    Stats(StatsArgs),
}

pub async fn execute(config: &EtlConfig, query: Query, json: bool) -> Result<()> {
    let (client, _) = config.retry.policy().connect(&config.graph).await?;

    let result = match query {
        Query::Status => cmd_status(&client, config, json).await,
        Query::Find(args) => cmd_find(&client, args, json).await,
        Query::Explore(args) => cmd_explore(&client, args, json).await,
        Query::Stats(args) => cmd_stats(&client, args, json).await,
    };

    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close graph store");
    }
    result
}

/// Show node and relationship counts.
async fn cmd_status(client: &GraphClient, config: &EtlConfig, json: bool) -> Result<()> {
    let counts = graph_counts(client).await?;
    if json {
        return output::print_json(&counts);
    }

    println!("{} {}", "Hospital Graph Status".bold(), config.graph.uri.dimmed());
    output::print_counts(&counts);
    Ok(())
}

async fn cmd_find(client: &GraphClient, args: FindArgs, json: bool) -> Result<()> {
    let nodes = find_nodes(client, args.kind, &args.filters, Some(args.limit)).await?;
    if json {
        return output::print_json(&nodes);
    }
    output::print_nodes(args.kind, &nodes);
    Ok(())
}

async fn cmd_explore(client: &GraphClient, args: ExploreArgs, json: bool) -> Result<()> {
    let found = neighbours(client, args.kind, args.id).await?;
    if json {
        return output::print_json(&found);
    }

    println!("{} {} {}", "Exploring".bold(), args.kind.to_string().cyan(), args.id.to_string().yellow());
    println!("{}", "─".repeat(50));
    output::print_neighbours(&found);
    Ok(())
}

async fn cmd_stats(client: &GraphClient, args: StatsArgs, json: bool) -> Result<()> {
    let visits = visits_per_hospital(client).await?;
    let diagnoses = top_diagnoses(client, args.top).await?;

    if json {
        return output::print_json(&serde_json::json!({
            "visits_per_hospital": visits,
            "top_diagnoses": diagnoses,
        }));
    }

    output::print_hospital_visits(&visits);
    println!();
    output::print_diagnoses(&diagnoses);
    Ok(())
}
