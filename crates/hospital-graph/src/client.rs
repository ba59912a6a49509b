//! Neo4j connection client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{
    BoltNull, BoltType, ConfigBuilder, Graph, Neo4jClientErrorKind, Neo4jErrorKind, Query,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use hospital_core::{
    Attribute, EdgeRecord, EtlError, EtlResult, GraphNode, NodeKind, Properties, PropertyValue,
    RelKind, ValueType,
};

use crate::cypher;
use crate::store::{
    incident, Connector, EdgeOutcome, EdgeWrite, GraphStore, Neighbour, NodeWrite, Predicate,
};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "hospital_demo_2026".to_string(),
            database: "neo4j".to_string(),
            max_connections: 4,
        }
    }
}

/// Client for Neo4j graph operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// `Graph::connect` only builds a lazy pool, so a `RETURN 1` ping follows
    /// to force the bolt handshake; an unreachable server fails here rather
    /// than on the first write.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(200)
            .build()
            .context("Failed to build Neo4j config")?;

        let graph = Graph::connect(neo4j_config)
            .await
            .context("Failed to create Neo4j connection pool")?;

        graph
            .run(Query::new(cypher::PING.to_string()))
            .await
            .context("Neo4j is not responding to queries")?;

        Ok(Self { graph })
    }

    /// Execute a Cypher query that returns no results.
    pub async fn execute(&self, query: Query) -> Result<()> {
        self.graph.run(query).await.context("Neo4j query execution failed")?;
        Ok(())
    }

    /// Execute a Cypher query and return results as rows.
    pub async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await.context("Neo4j query failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await.context("Failed to read Neo4j result row")? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a Cypher query and return a single scalar value.
    pub async fn query_scalar<T: DeserializeOwned>(&self, query: Query, field: &str) -> Result<Option<T>> {
        let rows = self.query(query).await?;
        if let Some(row) = rows.into_iter().next() {
            let val: T = row
                .get(field)
                .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", field, e))?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    async fn count(&self, statement: String) -> EtlResult<usize> {
        let count: i64 = self
            .query_scalar(Query::new(statement), "count")
            .await
            .map_err(store_error)?
            .unwrap_or(0);
        Ok(count.max(0) as usize)
    }
}

fn store_error(err: anyhow::Error) -> EtlError {
    EtlError::store(format!("{:#}", err))
}

/// Connect failures that retrying cannot fix become [`EtlError::Rejected`];
/// everything else stays a retryable store error.
fn connect_error(err: anyhow::Error) -> EtlError {
    match err.downcast_ref::<neo4rs::Error>() {
        Some(cause) if is_rejection(cause) => EtlError::rejected(format!("{:#}", err)),
        _ => store_error(err),
    }
}

fn is_rejection(err: &neo4rs::Error) -> bool {
    match err {
        neo4rs::Error::UrlParseError(_)
        | neo4rs::Error::UnsupportedScheme(_)
        | neo4rs::Error::InvalidDnsName(_)
        | neo4rs::Error::InvalidConfig
        | neo4rs::Error::AuthenticationError(_) => true,
        neo4rs::Error::Neo4j(e) => matches!(
            e.kind(),
            Neo4jErrorKind::Client(
                Neo4jClientErrorKind::Security(_) | Neo4jClientErrorKind::FatalDiscovery
            )
        ),
        _ => false,
    }
}

/// Bind a typed property value as a query parameter.
fn bind(query: Query, name: &str, value: &PropertyValue) -> Query {
    match value {
        PropertyValue::Integer(v) => query.param(name, *v),
        PropertyValue::Float(v) => query.param(name, *v),
        PropertyValue::Text(v) => query.param(name, v.as_str()),
        PropertyValue::Null => query.param(name, BoltType::Null(BoltNull)),
    }
}

/// Bind every declared attribute; absent ones are bound as null.
fn bind_all(mut query: Query, attrs: &[Attribute], props: &Properties) -> Query {
    for attr in attrs {
        let value = props.get(attr.name).cloned().unwrap_or(PropertyValue::Null);
        query = bind(query, attr.name, &value);
    }
    query
}

fn column_error(column: &str, err: impl std::fmt::Display) -> EtlError {
    EtlError::decode(format!("column '{}': {}", column, err))
}

/// Read the declared columns of a row into typed properties.
fn read_columns(row: &neo4rs::Row, attrs: &[Attribute]) -> EtlResult<Properties> {
    let mut props = Properties::new();
    for attr in attrs {
        let name = attr.name;
        let value = match (attr.ty, attr.optional) {
            (ValueType::Integer, false) => row.get::<i64>(name).map(PropertyValue::from),
            (ValueType::Integer, true) => row.get::<Option<i64>>(name).map(PropertyValue::from),
            (ValueType::Float, false) => row.get::<f64>(name).map(PropertyValue::from),
            (ValueType::Float, true) => row.get::<Option<f64>>(name).map(PropertyValue::from),
            (ValueType::Text, false) => row.get::<String>(name).map(PropertyValue::from),
            (ValueType::Text, true) => row.get::<Option<String>>(name).map(PropertyValue::from),
        }
        .map_err(|e| column_error(name, e))?;
        props.insert(name, value);
    }
    Ok(props)
}

fn read_id(row: &neo4rs::Row, column: &str) -> EtlResult<i64> {
    row.get::<i64>(column).map_err(|e| column_error(column, e))
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_unique_id(&self, kind: NodeKind) -> EtlResult<()> {
        self.execute(Query::new(cypher::unique_constraint(kind)))
            .await
            .map_err(store_error)
    }

    async fn merge_node(&self, node: &NodeWrite) -> EtlResult<()> {
        let query = Query::new(cypher::merge_node(node.kind)).param("id", node.id);
        let query = bind_all(query, node.kind.attributes(), &node.properties);
        self.execute(query).await.map_err(store_error)?;
        debug!(label = %node.kind, id = node.id, "Merged node");
        Ok(())
    }

    async fn merge_edge(&self, edge: &EdgeWrite) -> EtlResult<EdgeOutcome> {
        let query = Query::new(cypher::merge_edge(edge.kind))
            .param("from_id", edge.from_id)
            .param("to_id", edge.to_id);
        let query = bind_all(query, edge.kind.attributes(), &edge.properties);

        let rows = self.query(query).await.map_err(store_error)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| EtlError::decode("edge merge returned no row"))?;
        let has_from: bool = row.get("has_from").map_err(|e| column_error("has_from", e))?;
        let has_to: bool = row.get("has_to").map_err(|e| column_error("has_to", e))?;

        Ok(match (has_from, has_to) {
            (true, true) => {
                debug!(rel = %edge.kind, from = edge.from_id, to = edge.to_id, "Merged edge");
                EdgeOutcome::Merged
            }
            (false, _) => EdgeOutcome::MissingEndpoint { kind: edge.kind.from_kind(), id: edge.from_id },
            (true, false) => EdgeOutcome::MissingEndpoint { kind: edge.kind.to_kind(), id: edge.to_id },
        })
    }

    async fn count_nodes(&self, kind: NodeKind) -> EtlResult<usize> {
        self.count(cypher::count_nodes(kind)).await
    }

    async fn count_edges(&self, kind: RelKind) -> EtlResult<usize> {
        self.count(cypher::count_edges(kind)).await
    }

    async fn find_nodes(
        &self,
        kind: NodeKind,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> EtlResult<Vec<GraphNode>> {
        let mut query = Query::new(cypher::find_nodes(kind, predicates, limit.is_some()));
        for (i, predicate) in predicates.iter().enumerate() {
            query = bind(query, &cypher::predicate_param(i), &predicate.value);
        }
        if let Some(limit) = limit {
            query = query.param("limit", limit as i64);
        }

        let rows = self.query(query).await.map_err(store_error)?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = read_id(row, "id")?;
            let props = read_columns(row, kind.attributes())?;
            nodes.push(GraphNode::decode(kind, id, &props)?);
        }
        Ok(nodes)
    }

    async fn find_edges(&self, kind: RelKind) -> EtlResult<Vec<EdgeRecord>> {
        let rows = self
            .query(Query::new(cypher::find_edges(kind)))
            .await
            .map_err(store_error)?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            edges.push(EdgeRecord {
                kind,
                from_id: read_id(row, "from_id")?,
                to_id: read_id(row, "to_id")?,
                properties: read_columns(row, kind.attributes())?,
            });
        }
        Ok(edges)
    }

    async fn neighbours(&self, kind: NodeKind, id: i64) -> EtlResult<Vec<Neighbour>> {
        // One anchored match per incident type; the far label fixes the columns.
        let mut found = Vec::new();
        for (rel, outgoing) in incident(kind) {
            let other = if outgoing { rel.to_kind() } else { rel.from_kind() };
            let query = Query::new(cypher::neighbours(rel, outgoing)).param("id", id);
            let rows = self.query(query).await.map_err(store_error)?;
            for row in &rows {
                let other_id = read_id(row, "id")?;
                let props = read_columns(row, other.attributes())?;
                let node = GraphNode::decode(other, other_id, &props)?;
                found.push(Neighbour { relationship: rel, outgoing, node });
            }
        }
        debug!(label = %kind, id, found = found.len(), "Expanded neighbours");
        Ok(found)
    }

    async fn wipe(&self) -> EtlResult<()> {
        self.execute(Query::new(cypher::WIPE.to_string()))
            .await
            .map_err(store_error)
    }

    async fn close(&self) -> EtlResult<()> {
        // neo4rs has no explicit shutdown; pooled connections are released
        // when the last Graph handle is dropped.
        debug!("Neo4j client closed");
        Ok(())
    }
}

#[async_trait]
impl Connector for GraphConfig {
    type Store = GraphClient;

    fn target(&self) -> String {
        format!("{} (database '{}')", self.uri, self.database)
    }

    async fn connect(&self) -> EtlResult<GraphClient> {
        GraphClient::connect(self).await.map_err(connect_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn during_connect(err: neo4rs::Error) -> EtlError {
        connect_error(Err::<(), _>(err).context("Failed to create Neo4j connection pool").unwrap_err())
    }

    #[test]
    fn test_bad_config_and_credentials_are_rejections() {
        for err in [
            neo4rs::Error::InvalidConfig,
            neo4rs::Error::AuthenticationError("The client is unauthorized".to_string()),
            neo4rs::Error::UnsupportedScheme("http".to_string()),
        ] {
            let mapped = during_connect(err);
            assert!(matches!(mapped, EtlError::Rejected(_)), "{mapped}");
            assert!(!mapped.is_transient());
        }
    }

    #[test]
    fn test_unreachable_server_is_retryable() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let mapped = during_connect(neo4rs::Error::from(refused));
        assert!(matches!(mapped, EtlError::Store(_)));
        assert!(mapped.is_transient());

        let mapped = during_connect(neo4rs::Error::ConnectionError);
        assert!(mapped.is_transient());
        assert!(mapped.to_string().contains("Failed to create Neo4j connection pool"));
    }

    #[tokio::test]
    async fn test_malformed_uri_fails_on_first_attempt() {
        let config = GraphConfig { uri: "http://localhost:7474".to_string(), ..GraphConfig::default() };
        let policy = crate::RetryPolicy::new(20, std::time::Duration::from_secs(30));
        let err = policy.connect(&config).await.err().map(|e| e.is_transient());
        assert_eq!(err, Some(false));
    }
}
