//! Read-only queries over a loaded graph.
//!
//! Everything here goes through [`GraphStore`](crate::store::GraphStore), so
//! the same queries run against Neo4j and the in-memory store.

pub mod counts;
pub mod reports;
pub mod search;

pub use counts::{graph_counts, GraphCounts};
pub use reports::{top_diagnoses, visits_per_hospital, DiagnosisCount, HospitalVisits};
pub use search::{find_nodes, neighbours};
