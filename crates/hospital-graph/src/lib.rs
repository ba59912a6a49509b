//! # Hospital Graph
//!
//! Loads the hospital CSV snapshot into Neo4j as a property graph and
//! answers read-only questions about it.
//!
//! Provides the Neo4j client, schema setup, the retrying load pipeline and
//! typed queries, all over the [`GraphStore`] seam so the same code runs
//! against the in-memory store.

pub mod client;
pub mod cypher;
pub mod load;
pub mod queries;
pub mod retry;
pub mod schema;
pub mod store;

pub use client::{GraphClient, GraphConfig};
pub use load::{check_sources, load_dataset, GraphLoader, LoadReport};
pub use queries::{
    find_nodes, graph_counts, neighbours, top_diagnoses, visits_per_hospital, DiagnosisCount,
    GraphCounts, HospitalVisits,
};
pub use retry::RetryPolicy;
pub use schema::ensure_constraints;
pub use store::{
    Connector, EdgeOutcome, EdgeWrite, GraphStore, MemoryConnector, MemoryGraph, Neighbour,
    NodeWrite, Op, Predicate,
};
