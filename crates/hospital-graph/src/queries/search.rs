//! Filtered node lookups and one-hop neighbourhoods.

use hospital_core::{EtlResult, GraphNode, NodeKind};

use crate::store::{GraphStore, Neighbour, Predicate};

/// Find nodes of `kind` matching every filter expression.
///
/// Filters are `field=value` (equality, value coerced to the field's type)
/// or `field~text` (substring match on a text field). Unknown fields are
/// rejected before the store is queried.
pub async fn find_nodes<S: GraphStore + ?Sized>(
    store: &S,
    kind: NodeKind,
    filters: &[String],
    limit: Option<usize>,
) -> EtlResult<Vec<GraphNode>> {
    let predicates = filters
        .iter()
        .map(|expr| Predicate::parse(kind, expr))
        .collect::<EtlResult<Vec<_>>>()?;
    store.find_nodes(kind, &predicates, limit).await
}

/// Every node directly connected to the `kind` node with `id`, grouped in
/// relationship order.
pub async fn neighbours<S: GraphStore + ?Sized>(
    store: &S,
    kind: NodeKind,
    id: i64,
) -> EtlResult<Vec<Neighbour>> {
    store.neighbours(kind, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EdgeWrite, MemoryGraph, NodeWrite};
    use hospital_core::{EtlError, Hospital, Physician, RelKind};

    async fn seeded() -> MemoryGraph {
        let graph = MemoryGraph::new();
        for (id, name, state) in [(1, "City General", "CA"), (2, "Mercy Medical", "TX")] {
            graph
                .merge_node(&NodeWrite::of(&Hospital {
                    id,
                    name: name.to_string(),
                    state_name: state.to_string(),
                }))
                .await
                .unwrap();
        }
        graph
            .merge_node(&NodeWrite::of(&Physician {
                id: 7,
                name: "Dr. Sarah Johnson".to_string(),
                dob: "1970-03-14".to_string(),
                grad_year: "1996".to_string(),
                school: "Harvard".to_string(),
                salary: 310000.0,
            }))
            .await
            .unwrap();
        graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 2, 7)).await.unwrap();
        graph
    }

    #[tokio::test]
    async fn test_find_with_filters() {
        let graph = seeded().await;

        let all = find_nodes(&graph, NodeKind::Hospital, &[], None).await.unwrap();
        assert_eq!(all.len(), 2);

        let tx = find_nodes(&graph, NodeKind::Hospital, &["state_name=TX".to_string()], None)
            .await
            .unwrap();
        assert_eq!(tx.len(), 1);
        assert_eq!(tx[0].display_name(), "Mercy Medical");

        let limited = find_nodes(&graph, NodeKind::Hospital, &["name~e".to_string()], Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id(), 1);
    }

    #[tokio::test]
    async fn test_find_rejects_unknown_field() {
        let graph = seeded().await;
        let err = find_nodes(&graph, NodeKind::Hospital, &["beds=3".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_neighbours_follow_both_directions() {
        let graph = seeded().await;

        let from_hospital = neighbours(&graph, NodeKind::Hospital, 2).await.unwrap();
        assert_eq!(from_hospital.len(), 1);
        assert_eq!(from_hospital[0].relationship, RelKind::Employs);
        assert!(from_hospital[0].outgoing);
        assert_eq!(from_hospital[0].node.kind(), NodeKind::Physician);

        let from_physician = neighbours(&graph, NodeKind::Physician, 7).await.unwrap();
        assert_eq!(from_physician.len(), 1);
        assert!(!from_physician[0].outgoing);
        assert_eq!(from_physician[0].node.id(), 2);

        assert!(neighbours(&graph, NodeKind::Hospital, 1).await.unwrap().is_empty());
    }
}
