//! Centralized error types for the hospital graph.

use thiserror::Error;

use crate::model::{NodeKind, RelKind};

/// Fatal errors. Any of these aborts a load run.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Graph store unreachable after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    /// The store answered but will never accept this connection: bad URI,
    /// bad credentials or an unknown database.
    #[error("Graph store rejected the connection: {0}")]
    Rejected(String),

    #[error("Failed to create uniqueness constraint for :{label}: {message}")]
    ConstraintSetup { label: String, message: String },

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Cannot read source '{path}': {message}")]
    Source { path: String, message: String },

    #[error("Failed to decode graph record: {0}")]
    Decode(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for graph ETL operations.
pub type EtlResult<T> = Result<T, EtlError>;

impl EtlError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a rejected-connection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Whether the same operation could succeed if tried again later.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_) | Self::Config(_) | Self::Source { .. })
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an invalid query error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// A source field that could not be coerced to its declared type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("field '{field}' has value '{value}', expected {expected}")]
pub struct RowParseError {
    pub field: String,
    pub value: String,
    pub expected: &'static str,
}

impl RowParseError {
    pub fn new(field: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            expected,
        }
    }
}

/// A relationship row whose endpoint node does not exist in the graph.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{relationship} edge skipped: no :{missing} node with id {id}")]
pub struct MissingEndpointError {
    pub relationship: RelKind,
    pub missing: NodeKind,
    pub id: i64,
}
