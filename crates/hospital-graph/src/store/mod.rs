//! The graph store seam.
//!
//! The loader and the read-only queries only talk to a [`GraphStore`]: a
//! typed surface of merge-by-key writes, endpoint-checked edge merges and
//! typed reads. [`crate::GraphClient`] implements it over Neo4j;
//! [`MemoryGraph`] implements it in process for dry runs and tests.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use hospital_core::{
    EdgeRecord, Entity, EtlError, EtlResult, GraphNode, NodeKind, Properties, PropertyValue, RelKind,
};

pub use memory::{MemoryConnector, MemoryGraph};

/// An upsert of one node keyed by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWrite {
    pub kind: NodeKind,
    pub id: i64,
    pub properties: Properties,
}

impl NodeWrite {
    pub fn of<E: Entity>(entity: &E) -> Self {
        Self {
            kind: E::KIND,
            id: entity.id(),
            properties: entity.properties(),
        }
    }
}

/// An upsert of one edge between two existing nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeWrite {
    pub kind: RelKind,
    pub from_id: i64,
    pub to_id: i64,
    pub properties: Properties,
}

impl EdgeWrite {
    pub fn new(kind: RelKind, from_id: i64, to_id: i64) -> Self {
        Self { kind, from_id, to_id, properties: Properties::new() }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// What happened to an edge merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Merged,
    /// An endpoint node does not exist; nothing was written.
    MissingEndpoint { kind: NodeKind, id: i64 },
}

/// A node one relationship away from a centre node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbour {
    pub relationship: RelKind,
    /// True when the edge points away from the centre node.
    pub outgoing: bool,
    pub node: GraphNode,
}

/// Relationship types that touch `kind`, paired with `true` when `kind` is
/// the source end. Yields in [`RelKind::ALL`] order.
pub fn incident(kind: NodeKind) -> impl Iterator<Item = (RelKind, bool)> {
    RelKind::ALL.into_iter().flat_map(move |rel| {
        let outgoing = (rel.from_kind() == kind).then_some((rel, true));
        let incoming = (rel.to_kind() == kind).then_some((rel, false));
        outgoing.into_iter().chain(incoming)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Op {
    Eq,
    Contains,
}

/// A filter on one declared attribute of a node kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub field: &'static str,
    pub op: Op,
    pub value: PropertyValue,
}

impl Predicate {
    /// Parse `field=value` (equality) or `field~text` (substring) for `kind`.
    ///
    /// The field must be `id` or a declared attribute; the value is coerced to
    /// the attribute's type.
    pub fn parse(kind: NodeKind, expr: &str) -> EtlResult<Self> {
        let (field, op, raw) = match (expr.find('='), expr.find('~')) {
            (Some(i), Some(j)) if j < i => (&expr[..j], Op::Contains, &expr[j + 1..]),
            (Some(i), _) => (&expr[..i], Op::Eq, &expr[i + 1..]),
            (None, Some(j)) => (&expr[..j], Op::Contains, &expr[j + 1..]),
            (None, None) => {
                return Err(EtlError::invalid_query(format!(
                    "filter '{}' must look like field=value or field~text",
                    expr
                )))
            }
        };

        let field = field.trim();
        let attr = kind.attribute(field).ok_or_else(|| {
            EtlError::invalid_query(format!("{} has no attribute '{}'", kind, field))
        })?;

        let value = match op {
            Op::Contains => PropertyValue::Text(raw.trim().to_string()),
            Op::Eq => attr
                .coerce(raw.trim())
                .map_err(|e| EtlError::invalid_query(e.to_string()))?,
        };
        if op == Op::Contains && attr.ty != hospital_core::ValueType::Text {
            return Err(EtlError::invalid_query(format!("'{}' is not a text attribute", field)));
        }

        Ok(Self { field: attr.name, op, value })
    }

    /// Evaluate against a node's id and properties.
    pub fn matches(&self, id: i64, props: &Properties) -> bool {
        let actual = if self.field == "id" {
            Some(PropertyValue::Integer(id))
        } else {
            props.get(self.field).cloned()
        };
        match (self.op, actual) {
            (Op::Eq, Some(v)) => v == self.value,
            (Op::Contains, Some(PropertyValue::Text(text))) => match &self.value {
                PropertyValue::Text(needle) => text.contains(needle.as_str()),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Typed write/read surface of the backing graph database.
///
/// Every write is a merge keyed by `id`, so repeating any write is harmless.
/// Each call is atomic on its own.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create the uniqueness constraint on `id` for `kind` if it is missing.
    async fn ensure_unique_id(&self, kind: NodeKind) -> EtlResult<()>;

    /// Merge a node by `id` and refresh all of its attributes.
    async fn merge_node(&self, node: &NodeWrite) -> EtlResult<()>;

    /// Merge an edge if both endpoints exist and refresh its properties.
    async fn merge_edge(&self, edge: &EdgeWrite) -> EtlResult<EdgeOutcome>;

    async fn count_nodes(&self, kind: NodeKind) -> EtlResult<usize>;

    async fn count_edges(&self, kind: RelKind) -> EtlResult<usize>;

    /// Nodes of `kind` matching every predicate, ordered by id.
    async fn find_nodes(
        &self,
        kind: NodeKind,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> EtlResult<Vec<GraphNode>>;

    /// All edges of `kind`, ordered by (from, to).
    async fn find_edges(&self, kind: RelKind) -> EtlResult<Vec<EdgeRecord>>;

    /// Nodes one edge away from the `kind` node with `id`, grouped by
    /// [`incident`] order and ordered by id within each group. Empty when the
    /// node does not exist.
    async fn neighbours(&self, kind: NodeKind, id: i64) -> EtlResult<Vec<Neighbour>>;

    /// Delete every node and edge.
    async fn wipe(&self) -> EtlResult<()>;

    /// Release the connection. The store must not be used afterwards.
    async fn close(&self) -> EtlResult<()>;
}

/// Opens a [`GraphStore`]. Called once per attempt by the retry policy.
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: GraphStore;

    /// Where this connector points, for logs.
    fn target(&self) -> String;

    async fn connect(&self) -> EtlResult<Self::Store>;
}
