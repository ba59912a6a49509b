//! In-process graph store.
//!
//! Mirrors the merge semantics of the Neo4j store: nodes are keyed by
//! (label, id), edges by (type, from, to), and an edge is only written when
//! both endpoints exist. Used by `check` dry runs and by the loader tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use hospital_core::{EdgeRecord, EtlError, EtlResult, GraphNode, NodeKind, Properties, RelKind};

use super::{
    incident, Connector, EdgeOutcome, EdgeWrite, GraphStore, Neighbour, NodeWrite, Predicate,
};

#[derive(Debug, Default)]
struct MemoryState {
    constraints: BTreeSet<NodeKind>,
    nodes: BTreeMap<(NodeKind, i64), Properties>,
    edges: BTreeMap<(RelKind, i64, i64), Properties>,
    /// `edges` keyed by (type, to, from).
    reverse: BTreeSet<(RelKind, i64, i64)>,
    open_handles: usize,
    reject_constraints: bool,
}

/// A shared in-memory graph. Clones are handles onto the same graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handles opened through a connector and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    /// Labels that currently carry a uniqueness constraint.
    pub fn constraints(&self) -> Vec<NodeKind> {
        self.state().constraints.iter().copied().collect()
    }

    /// Make every constraint creation fail, as a store without schema
    /// privileges would.
    pub fn reject_constraints(&self, reject: bool) {
        self.state().reject_constraints = reject;
    }

    /// Whether an edge of `kind` exists between the two ids.
    pub fn has_edge(&self, kind: RelKind, from_id: i64, to_id: i64) -> bool {
        self.state().edges.contains_key(&(kind, from_id, to_id))
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_unique_id(&self, kind: NodeKind) -> EtlResult<()> {
        let mut state = self.state();
        if state.reject_constraints {
            return Err(EtlError::store(format!(
                "schema changes are not permitted (constraint on :{})",
                kind
            )));
        }
        state.constraints.insert(kind);
        Ok(())
    }

    async fn merge_node(&self, node: &NodeWrite) -> EtlResult<()> {
        let mut state = self.state();
        let entry = state.nodes.entry((node.kind, node.id)).or_default();
        for (name, value) in node.properties.iter() {
            entry.insert(name, value.clone());
        }
        Ok(())
    }

    async fn merge_edge(&self, edge: &EdgeWrite) -> EtlResult<EdgeOutcome> {
        let mut state = self.state();
        let from = (edge.kind.from_kind(), edge.from_id);
        let to = (edge.kind.to_kind(), edge.to_id);
        if !state.nodes.contains_key(&from) {
            return Ok(EdgeOutcome::MissingEndpoint { kind: from.0, id: from.1 });
        }
        if !state.nodes.contains_key(&to) {
            return Ok(EdgeOutcome::MissingEndpoint { kind: to.0, id: to.1 });
        }

        state.reverse.insert((edge.kind, edge.to_id, edge.from_id));
        let entry = state.edges.entry((edge.kind, edge.from_id, edge.to_id)).or_default();
        for (name, value) in edge.properties.iter() {
            entry.insert(name, value.clone());
        }
        Ok(EdgeOutcome::Merged)
    }

    async fn count_nodes(&self, kind: NodeKind) -> EtlResult<usize> {
        Ok(self.state().nodes.keys().filter(|(k, _)| *k == kind).count())
    }

    async fn count_edges(&self, kind: RelKind) -> EtlResult<usize> {
        Ok(self.state().edges.keys().filter(|(k, _, _)| *k == kind).count())
    }

    async fn find_nodes(
        &self,
        kind: NodeKind,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> EtlResult<Vec<GraphNode>> {
        let state = self.state();
        let matching = state
            .nodes
            .range((kind, i64::MIN)..=(kind, i64::MAX))
            .filter(|((_, id), props)| predicates.iter().all(|p| p.matches(*id, props)))
            .take(limit.unwrap_or(usize::MAX));

        let mut nodes = Vec::new();
        for ((_, id), props) in matching {
            nodes.push(GraphNode::decode(kind, *id, props)?);
        }
        Ok(nodes)
    }

    async fn find_edges(&self, kind: RelKind) -> EtlResult<Vec<EdgeRecord>> {
        Ok(self
            .state()
            .edges
            .range((kind, i64::MIN, i64::MIN)..=(kind, i64::MAX, i64::MAX))
            .map(|((_, from_id, to_id), props)| EdgeRecord {
                kind,
                from_id: *from_id,
                to_id: *to_id,
                properties: props.clone(),
            })
            .collect())
    }

    async fn neighbours(&self, kind: NodeKind, id: i64) -> EtlResult<Vec<Neighbour>> {
        let state = self.state();
        let mut found = Vec::new();
        for (rel, outgoing) in incident(kind) {
            let (other, ids): (NodeKind, Vec<i64>) = if outgoing {
                let ids = state
                    .edges
                    .range((rel, id, i64::MIN)..=(rel, id, i64::MAX))
                    .map(|((_, _, to_id), _)| *to_id)
                    .collect();
                (rel.to_kind(), ids)
            } else {
                let ids = state
                    .reverse
                    .range((rel, id, i64::MIN)..=(rel, id, i64::MAX))
                    .map(|(_, _, from_id)| *from_id)
                    .collect();
                (rel.from_kind(), ids)
            };

            for other_id in ids {
                if let Some(props) = state.nodes.get(&(other, other_id)) {
                    let node = GraphNode::decode(other, other_id, props)?;
                    found.push(Neighbour { relationship: rel, outgoing, node });
                }
            }
        }
        Ok(found)
    }

    async fn wipe(&self) -> EtlResult<()> {
        let mut state = self.state();
        state.nodes.clear();
        state.edges.clear();
        state.reverse.clear();
        Ok(())
    }

    async fn close(&self) -> EtlResult<()> {
        let mut state = self.state();
        state.open_handles = state.open_handles.saturating_sub(1);
        Ok(())
    }
}

/// Connector onto a [`MemoryGraph`] that can refuse its first attempts,
/// like a database that is still starting up.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    graph: MemoryGraph,
    refusals_left: AtomicU32,
    attempts: AtomicU32,
    reject: bool,
}

impl MemoryConnector {
    pub fn new(graph: MemoryGraph) -> Self {
        Self {
            graph,
            refusals_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            reject: false,
        }
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_first(self, n: u32) -> Self {
        self.refusals_left.store(n, Ordering::SeqCst);
        self
    }

    /// Reject every attempt as a server would reject bad credentials.
    pub fn reject_credentials(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Connection attempts made so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Store = MemoryGraph;

    fn target(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&self) -> EtlResult<MemoryGraph> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(EtlError::rejected("authentication failure"));
        }
        let refused = self
            .refusals_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(EtlError::store("connection refused"));
        }
        self.graph.state().open_handles += 1;
        Ok(self.graph.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hospital_core::{Hospital, Payer, Physician};

    fn hospital(id: i64, name: &str) -> NodeWrite {
        NodeWrite::of(&Hospital { id, name: name.to_string(), state_name: "CA".to_string() })
    }

    #[tokio::test]
    async fn test_merge_node_is_idempotent_and_refreshes() {
        let graph = MemoryGraph::new();
        graph.merge_node(&hospital(1, "City General")).await.unwrap();
        graph.merge_node(&hospital(1, "City General Hospital")).await.unwrap();

        assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 1);
        let nodes = graph.find_nodes(NodeKind::Hospital, &[], None).await.unwrap();
        assert_eq!(nodes[0].display_name(), "City General Hospital");
    }

    #[tokio::test]
    async fn test_merge_edge_requires_both_endpoints() {
        let graph = MemoryGraph::new();
        graph.merge_node(&hospital(1, "City General")).await.unwrap();

        let outcome = graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 1, 5)).await.unwrap();
        assert_eq!(outcome, EdgeOutcome::MissingEndpoint { kind: NodeKind::Physician, id: 5 });
        assert_eq!(graph.count_edges(RelKind::Employs).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_nodes_filters_by_kind_and_predicate() {
        let graph = MemoryGraph::new();
        graph.merge_node(&hospital(1, "City General")).await.unwrap();
        graph.merge_node(&hospital(2, "Lakeside Clinic")).await.unwrap();
        graph
            .merge_node(&NodeWrite::of(&Payer { id: 1, name: "Aetna".to_string() }))
            .await
            .unwrap();

        let filter = Predicate::parse(NodeKind::Hospital, "name~Lake").unwrap();
        let nodes = graph.find_nodes(NodeKind::Hospital, &[filter], None).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id(), 2);

        let limited = graph.find_nodes(NodeKind::Hospital, &[], Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id(), 1);
    }

    #[tokio::test]
    async fn test_connector_refusals_and_handles() {
        let connector = MemoryConnector::new(MemoryGraph::new()).refuse_first(2);
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_err());
        let store = connector.connect().await.unwrap();
        assert_eq!(connector.attempts(), 3);
        assert_eq!(connector.graph().open_handles(), 1);

        store.close().await.unwrap();
        assert_eq!(connector.graph().open_handles(), 0);
    }

    #[tokio::test]
    async fn test_neighbours_use_both_edge_indexes() {
        let graph = MemoryGraph::new();
        for id in 1..=3 {
            graph.merge_node(&hospital(id, "Hospital")).await.unwrap();
        }
        for id in [5, 6] {
            graph
                .merge_node(&NodeWrite::of(&Physician {
                    id,
                    name: format!("Dr. {}", id),
                    dob: "1970-01-01".to_string(),
                    grad_year: "1995".to_string(),
                    school: "Yale".to_string(),
                    salary: 200000.0,
                }))
                .await
                .unwrap();
        }
        graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 2, 6)).await.unwrap();
        graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 2, 5)).await.unwrap();
        graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 3, 5)).await.unwrap();
        graph.merge_edge(&EdgeWrite::new(RelKind::Employs, 1, 6)).await.unwrap();

        let staff = graph.neighbours(NodeKind::Hospital, 2).await.unwrap();
        let ids: Vec<i64> = staff.iter().map(|n| n.node.id()).collect();
        assert_eq!(ids, vec![5, 6]);
        assert!(staff.iter().all(|n| n.outgoing && n.relationship == RelKind::Employs));

        let employers = graph.neighbours(NodeKind::Physician, 5).await.unwrap();
        let ids: Vec<i64> = employers.iter().map(|n| n.node.id()).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(employers.iter().all(|n| !n.outgoing && n.node.kind() == NodeKind::Hospital));

        assert!(graph.neighbours(NodeKind::Hospital, 42).await.unwrap().is_empty());

        graph.wipe().await.unwrap();
        graph.merge_node(&hospital(2, "Hospital")).await.unwrap();
        assert!(graph.neighbours(NodeKind::Hospital, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wipe_clears_nodes_and_edges_but_keeps_constraints() {
        let graph = MemoryGraph::new();
        graph.ensure_unique_id(NodeKind::Hospital).await.unwrap();
        graph.merge_node(&hospital(1, "City General")).await.unwrap();
        graph.wipe().await.unwrap();
        assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 0);
        assert_eq!(graph.constraints(), vec![NodeKind::Hospital]);
    }
}
