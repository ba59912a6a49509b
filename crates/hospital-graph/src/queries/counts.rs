//! Node and relationship counts.

use std::collections::BTreeMap;

use serde::Serialize;

use hospital_core::{EtlResult, NodeKind, RelKind};

use crate::store::GraphStore;

/// Node counts per label and edge counts per relationship type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphCounts {
    pub nodes: BTreeMap<NodeKind, usize>,
    pub relationships: BTreeMap<RelKind, usize>,
}

impl GraphCounts {
    pub fn total_nodes(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn total_relationships(&self) -> usize {
        self.relationships.values().sum()
    }
}

/// Count every label and relationship type.
pub async fn graph_counts<S: GraphStore + ?Sized>(store: &S) -> EtlResult<GraphCounts> {
    let mut counts = GraphCounts::default();
    for kind in NodeKind::ALL {
        counts.nodes.insert(kind, store.count_nodes(kind).await?);
    }
    for kind in RelKind::ALL {
        counts.relationships.insert(kind, store.count_edges(kind).await?);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EdgeWrite, MemoryGraph, NodeWrite};
    use hospital_core::{Hospital, Payer};

    #[tokio::test]
    async fn test_counts_cover_every_kind() {
        let graph = MemoryGraph::new();
        let empty = graph_counts(&graph).await.unwrap();
        assert_eq!(empty.nodes.len(), 6);
        assert_eq!(empty.relationships.len(), 6);
        assert_eq!(empty.total_nodes(), 0);

        graph
            .merge_node(&NodeWrite::of(&Hospital {
                id: 1,
                name: "City General".to_string(),
                state_name: "CA".to_string(),
            }))
            .await
            .unwrap();
        graph
            .merge_node(&NodeWrite::of(&Payer { id: 1, name: "Aetna".to_string() }))
            .await
            .unwrap();
        // Same id under another label is a different node.
        assert_eq!(graph_counts(&graph).await.unwrap().total_nodes(), 2);

        // No visit 1, so nothing is written.
        graph.merge_edge(&EdgeWrite::new(RelKind::At, 1, 1)).await.unwrap();
        assert_eq!(graph_counts(&graph).await.unwrap().total_relationships(), 0);
    }
}
