//! Cypher statements for the Neo4j store.
//!
//! Labels, relationship types and property names are only ever taken from
//! the static declarations in `hospital_core::model`; every value is bound
//! as a parameter.

use hospital_core::{Attribute, NodeKind, RelKind};

use crate::store::{Op, Predicate};

/// `CREATE CONSTRAINT ... IF NOT EXISTS` for the `id` key of a label.
pub fn unique_constraint(kind: NodeKind) -> String {
    format!(
        "CREATE CONSTRAINT {}_id IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
        kind.label().to_lowercase(),
        kind.label()
    )
}

fn set_clause(var: &str, attrs: &[Attribute]) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let assignments: Vec<String> = attrs
        .iter()
        .map(|a| format!("{var}.{name} = ${name}", var = var, name = a.name))
        .collect();
    format!(" SET {}", assignments.join(", "))
}

/// Merge a node on `id`, then refresh every declared attribute.
pub fn merge_node(kind: NodeKind) -> String {
    format!(
        "MERGE (n:{} {{id: $id}}){}",
        kind.label(),
        set_clause("n", kind.attributes())
    )
}

/// Merge an edge only when both endpoints exist, in one statement.
///
/// Returns a single row telling which endpoints were found.
pub fn merge_edge(kind: RelKind) -> String {
    format!(
        "OPTIONAL MATCH (a:{from} {{id: $from_id}}) \
         OPTIONAL MATCH (b:{to} {{id: $to_id}}) \
         FOREACH (ignored IN CASE WHEN a IS NULL OR b IS NULL THEN [] ELSE [1] END | \
         MERGE (a)-[r:{rel}]->(b){set}) \
         RETURN a IS NOT NULL AS has_from, b IS NOT NULL AS has_to",
        from = kind.from_kind().label(),
        to = kind.to_kind().label(),
        rel = kind.type_name(),
        set = set_clause("r", kind.attributes()),
    )
}

pub fn count_nodes(kind: NodeKind) -> String {
    format!("MATCH (n:{}) RETURN count(n) AS count", kind.label())
}

pub fn count_edges(kind: RelKind) -> String {
    format!(
        "MATCH (:{})-[r:{}]->(:{}) RETURN count(r) AS count",
        kind.from_kind().label(),
        kind.type_name(),
        kind.to_kind().label()
    )
}

/// Parameter name bound to the predicate at `index`.
pub fn predicate_param(index: usize) -> String {
    format!("p{}", index)
}

/// Select nodes of `kind` matching all predicates, returning `id` and every
/// declared attribute as its own column.
pub fn find_nodes(kind: NodeKind, predicates: &[Predicate], limited: bool) -> String {
    let mut cypher = format!("MATCH (n:{})", kind.label());

    if !predicates.is_empty() {
        let conditions: Vec<String> = predicates
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let op = match p.op {
                    Op::Eq => "=",
                    Op::Contains => "CONTAINS",
                };
                format!("n.{} {} ${}", p.field, op, predicate_param(i))
            })
            .collect();
        cypher.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
    }

    let mut columns = vec!["n.id AS id".to_string()];
    columns.extend(kind.attributes().iter().map(|a| format!("n.{0} AS {0}", a.name)));
    cypher.push_str(&format!(" RETURN {} ORDER BY n.id", columns.join(", ")));

    if limited {
        cypher.push_str(" LIMIT $limit");
    }
    cypher
}

/// Select all edges of `kind` with their endpoint ids and properties.
pub fn find_edges(kind: RelKind) -> String {
    let mut columns = vec!["a.id AS from_id".to_string(), "b.id AS to_id".to_string()];
    columns.extend(kind.attributes().iter().map(|a| format!("r.{0} AS {0}", a.name)));
    format!(
        "MATCH (a:{})-[r:{}]->(b:{}) RETURN {} ORDER BY from_id, to_id",
        kind.from_kind().label(),
        kind.type_name(),
        kind.to_kind().label(),
        columns.join(", ")
    )
}

/// Select the far end of every `kind` edge touching the node with `$id`.
///
/// The centre node is matched on `{id: $id}` at whichever end it sits, so
/// the uniqueness index drives the lookup.
pub fn neighbours(kind: RelKind, outgoing: bool) -> String {
    let (pattern, other) = if outgoing {
        (
            format!(
                "(n:{} {{id: $id}})-[:{}]->(m:{})",
                kind.from_kind().label(),
                kind.type_name(),
                kind.to_kind().label()
            ),
            kind.to_kind(),
        )
    } else {
        (
            format!(
                "(m:{})-[:{}]->(n:{} {{id: $id}})",
                kind.from_kind().label(),
                kind.type_name(),
                kind.to_kind().label()
            ),
            kind.from_kind(),
        )
    };

    let mut columns = vec!["m.id AS id".to_string()];
    columns.extend(other.attributes().iter().map(|a| format!("m.{0} AS {0}", a.name)));
    format!("MATCH {} RETURN {} ORDER BY m.id", pattern, columns.join(", "))
}

pub const WIPE: &str = "MATCH (n) DETACH DELETE n";

pub const PING: &str = "RETURN 1";
