//! CSV to graph load pipeline.
//!
//! Parses the six sources, then writes them over a single store connection:
//! constraints first, every node kind next, relationships last. Row-level
//! problems are collected into the [`LoadReport`]; anything else aborts.

pub mod nodes;
pub mod relationships;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use hospital_core::{Dataset, EtlResult, NodeKind, RelKind, RowIssue, SourcePaths};

use crate::retry::RetryPolicy;
use crate::schema::ensure_constraints;
use crate::store::{Connector, GraphStore, MemoryConnector, MemoryGraph};

pub use nodes::{load_nodes, node_writes};
pub use relationships::{edge_rows, load_relationships, EdgeRow};

/// Relationship kinds in load order. Every node kind is loaded before these.
pub const RELATIONSHIP_ORDER: [RelKind; 6] = [
    RelKind::At,
    RelKind::Treats,
    RelKind::Has,
    RelKind::CoveredBy,
    RelKind::Employs,
    RelKind::Writes,
];

/// Outcome of one load run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Rows merged per node label.
    pub nodes: BTreeMap<NodeKind, usize>,
    /// Edge writes merged per relationship type. EMPLOYS counts one write per
    /// visit even though repeated pairs collapse into one edge.
    pub relationships: BTreeMap<RelKind, usize>,
    pub issues: Vec<RowIssue>,
    /// Connection attempts used, including the successful one.
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl LoadReport {
    /// Distinct source rows with at least one issue. One visit row can
    /// lose several edges and still counts once.
    pub fn skipped_rows(&self) -> usize {
        self.issues
            .iter()
            .map(|issue| (issue.table, issue.line))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn nodes_merged(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn relationships_merged(&self) -> usize {
        self.relationships.values().sum()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Run the whole pipeline on an open store.
///
/// With `wipe_first` every node and edge is deleted before the constraints
/// are ensured. The store is left open; closing it is the caller's job.
pub async fn load_dataset<S: GraphStore + ?Sized>(
    store: &S,
    dataset: &Dataset,
    wipe_first: bool,
) -> EtlResult<LoadReport> {
    let started = Instant::now();
    let mut report = LoadReport {
        issues: dataset.issues.clone(),
        ..LoadReport::default()
    };

    if wipe_first {
        warn!("Deleting every node and relationship before loading");
        store.wipe().await?;
    }

    ensure_constraints(store).await?;

    for kind in NodeKind::ALL {
        let merged = load_nodes(store, dataset, kind).await?;
        report.nodes.insert(kind, merged);
    }

    for kind in RELATIONSHIP_ORDER {
        let merged = load_relationships(store, dataset, kind, &mut report.issues).await?;
        report.relationships.insert(kind, merged);
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}

/// Connects through a [`Connector`] and runs loads on the resulting store.
pub struct GraphLoader<C: Connector> {
    connector: C,
    retry: RetryPolicy,
}

impl<C: Connector> GraphLoader<C> {
    pub fn new(connector: C, retry: RetryPolicy) -> Self {
        Self { connector, retry }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Parse the sources, then load them. Source files are read before any
    /// connection is attempted, so a missing file never waits on retries.
    pub async fn run_full_load(&self, paths: &SourcePaths) -> EtlResult<LoadReport> {
        let dataset = Dataset::load(paths)?;
        self.load(&dataset).await
    }

    /// Wipe the graph, then load the sources into it.
    pub async fn run_full_reset(&self, paths: &SourcePaths) -> EtlResult<LoadReport> {
        let dataset = Dataset::load(paths)?;
        self.reset_and_load(&dataset).await
    }

    pub async fn load(&self, dataset: &Dataset) -> EtlResult<LoadReport> {
        self.run(dataset, false).await
    }

    pub async fn reset_and_load(&self, dataset: &Dataset) -> EtlResult<LoadReport> {
        self.run(dataset, true).await
    }

    async fn run(&self, dataset: &Dataset, wipe_first: bool) -> EtlResult<LoadReport> {
        let started = Instant::now();
        info!(rows = dataset.row_count(), wipe_first, "Starting graph load");

        let (store, attempts) = self.retry.connect(&self.connector).await?;
        let outcome = load_dataset(&store, dataset, wipe_first).await;
        if let Err(e) = store.close().await {
            warn!(error = %e, "Failed to close graph store");
        }

        let mut report = outcome?;
        report.attempts = attempts;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            nodes = report.nodes_merged(),
            relationships = report.relationships_merged(),
            skipped = report.skipped_rows(),
            issues = report.issue_count(),
            elapsed_ms = report.elapsed_ms,
            "Graph load complete"
        );
        Ok(report)
    }
}

/// Dry run: load `dataset` into a fresh in-memory graph through the same
/// pipeline. Returns the report and the populated graph.
pub async fn check_sources(dataset: &Dataset) -> EtlResult<(LoadReport, MemoryGraph)> {
    let graph = MemoryGraph::new();
    let loader = GraphLoader::new(
        MemoryConnector::new(graph.clone()),
        RetryPolicy::new(1, Duration::ZERO),
    );
    let report = loader.load(dataset).await?;
    Ok((report, graph))
}
