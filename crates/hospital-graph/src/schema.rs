//! Schema initialization: one uniqueness constraint on `id` per node label.
//!
//! The constraint also gives every label the index the merge statements
//! look nodes up by.

use tracing::info;

use hospital_core::{EtlError, EtlResult, NodeKind};

use crate::store::GraphStore;

/// Create the `id` uniqueness constraint for every node kind.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses. Any failure is
/// fatal: without the constraints merges cannot guarantee one node per id.
pub async fn ensure_constraints<S: GraphStore + ?Sized>(store: &S) -> EtlResult<()> {
    info!("Setting uniqueness constraints on nodes");

    for kind in NodeKind::ALL {
        store
            .ensure_unique_id(kind)
            .await
            .map_err(|e| EtlError::ConstraintSetup {
                label: kind.label().to_string(),
                message: e.to_string(),
            })?;
    }

    info!("Uniqueness constraints in place ({} labels)", NodeKind::ALL.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGraph;

    #[tokio::test]
    async fn test_constraints_are_repeatable() {
        let graph = MemoryGraph::new();
        ensure_constraints(&graph).await.unwrap();
        ensure_constraints(&graph).await.unwrap();
        assert_eq!(graph.constraints(), NodeKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_constraint_failure_is_constraint_setup_error() {
        let graph = MemoryGraph::new();
        graph.reject_constraints(true);
        let err = ensure_constraints(&graph).await.unwrap_err();
        match err {
            EtlError::ConstraintSetup { label, .. } => assert_eq!(label, "Hospital"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
