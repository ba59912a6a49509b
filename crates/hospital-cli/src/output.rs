//! Terminal output formatting.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use hospital_core::{GraphNode, NodeKind};
use hospital_graph::{DiagnosisCount, GraphCounts, HospitalVisits, LoadReport, Neighbour};

/// Print any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a load report: merge counts per kind, then every skipped row.
pub fn print_report(report: &LoadReport, title: &str) {
    let heading = if report.is_clean() { title.green().bold() } else { title.yellow().bold() };
    println!("\n{}", heading);
    println!("{}", "─".repeat(50));

    println!("{}", "Nodes merged".bold());
    for (kind, count) in &report.nodes {
        println!("  {:<14} {}", kind.label(), count.to_string().cyan());
    }
    println!("{}", "Relationships merged".bold());
    for (kind, count) in &report.relationships {
        println!("  {:<14} {}", kind.type_name(), count.to_string().cyan());
    }

    println!("{}", "─".repeat(50));
    println!(
        "  Connection attempts: {}   Elapsed: {:.2}s",
        report.attempts,
        report.elapsed().as_secs_f64()
    );

    if report.is_clean() {
        println!("  Skipped rows:        {}", "0".green());
        return;
    }

    println!(
        "  Skipped rows:        {} ({} issue(s))",
        report.skipped_rows().to_string().yellow(),
        report.issue_count()
    );
    println!();
    for issue in &report.issues {
        let category = if issue.is_parse() { "parse".red() } else { "missing".yellow() };
        println!("  {} [{}] {}", "•".dimmed(), category, issue);
    }
}

/// Print per-label and per-type counts.
pub fn print_counts(counts: &GraphCounts) {
    println!("{}", "─".repeat(40));
    for (kind, count) in &counts.nodes {
        println!("  {:<14} {}", kind.label(), count.to_string().cyan());
    }
    println!("  {:<14} {}", "Nodes".bold(), counts.total_nodes().to_string().cyan().bold());
    println!();
    for (kind, count) in &counts.relationships {
        println!("  {:<14} {}", kind.type_name(), count.to_string().cyan());
    }
    println!(
        "  {:<14} {}",
        "Relationships".bold(),
        counts.total_relationships().to_string().cyan().bold()
    );
    println!("{}", "─".repeat(40));
}

/// Print nodes as a table of id, name and the remaining attributes.
pub fn print_nodes(kind: NodeKind, nodes: &[GraphNode]) {
    if nodes.is_empty() {
        println!("{}", format!("No {} nodes found.", kind).dimmed());
        return;
    }

    println!("{:<8} {:<32} {}", "ID", "Name", "Details");
    println!("{}", "─".repeat(80));

    for node in nodes {
        let details = node
            .properties()
            .iter()
            .filter(|(name, _)| !matches!(*name, "name" | "text"))
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<8} {:<32} {}",
            node.id().to_string().yellow(),
            truncate(&node.display_name(), 30),
            truncate(&details, 60).dimmed()
        );
    }

    println!("\n{} {} node(s)", nodes.len().to_string().bold(), kind);
}

pub fn print_neighbours(found: &[Neighbour]) {
    if found.is_empty() {
        println!("{}", "No connected nodes found.".dimmed());
        return;
    }

    for n in found {
        let arrow = if n.outgoing {
            format!("-[:{}]->", n.relationship)
        } else {
            format!("<-[:{}]-", n.relationship)
        };
        println!(
            "  {} [{}] {} {}",
            arrow.dimmed(),
            n.node.kind().to_string().cyan(),
            n.node.id().to_string().yellow(),
            n.node.display_name()
        );
    }
    println!("\n{} connected node(s)", found.len().to_string().bold());
}

pub fn print_hospital_visits(rows: &[HospitalVisits]) {
    println!("{}", "Visits per hospital".bold());
    println!("{:<6} {:<36} {:<6} {}", "ID", "Hospital", "State", "Visits");
    println!("{}", "─".repeat(60));
    for row in rows {
        println!(
            "{:<6} {:<36} {:<6} {}",
            row.hospital_id,
            truncate(&row.hospital, 34),
            row.state_name,
            row.visits.to_string().cyan()
        );
    }
}

pub fn print_diagnoses(rows: &[DiagnosisCount]) {
    println!("{}", "Most common diagnoses".bold());
    println!("{}", "─".repeat(60));
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:>3}. {:<44} {}",
            i + 1,
            truncate(&row.diagnosis, 42),
            row.count.to_string().cyan()
        );
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Pneumonia", 20), "Pneumonia");
        assert_eq!(truncate("Chronic obstructive pulmonary disease", 10), "Chronic...");
        assert_eq!(truncate("Überweisung an Kardiologie", 8), "Überw...");
    }
}
