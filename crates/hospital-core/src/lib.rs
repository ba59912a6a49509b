//! Hospital Core Library
//!
//! Domain model of the hospital graph (six node kinds, six relationship
//! kinds), CSV source reading with explicit type coercion, and the error and
//! row-issue types shared by the loader.

pub mod coerce;
pub mod error;
pub mod issue;
pub mod model;
pub mod source;

pub use error::{EtlError, EtlResult, MissingEndpointError, RowParseError};
pub use issue::{IssueKind, RowIssue};
pub use model::{
    Attribute, EdgeRecord, Entity, GraphNode, Hospital, NodeKind, Patient, Payer, Physician,
    Properties, PropertyValue, RelKind, Review, ValueType, Visit,
};
pub use source::{Dataset, ReviewRow, SourcePaths, Sourced, Table, VisitRow};
