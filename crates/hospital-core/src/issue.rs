//! Row-level issues: recorded, logged, and skipped without aborting a load.

use std::fmt;

use serde::Serialize;

use crate::error::{MissingEndpointError, RowParseError};
use crate::source::Table;

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    Parse(RowParseError),
    MissingEndpoint(MissingEndpointError),
}

/// A skipped source row and the reason it was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub table: Table,
    /// Line in the source file where the record starts (header is line 1).
    pub line: u64,
    /// Business id of the row, when it could be read.
    pub key: Option<i64>,
    pub kind: IssueKind,
}

impl RowIssue {
    pub fn parse(table: Table, line: u64, key: Option<i64>, err: RowParseError) -> Self {
        Self { table, line, key, kind: IssueKind::Parse(err) }
    }

    pub fn missing_endpoint(table: Table, line: u64, key: Option<i64>, err: MissingEndpointError) -> Self {
        Self { table, line, key, kind: IssueKind::MissingEndpoint(err) }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self.kind, IssueKind::Parse(_))
    }

    pub fn reason(&self) -> String {
        match &self.kind {
            IssueKind::Parse(e) => e.to_string(),
            IssueKind::MissingEndpoint(e) => e.to_string(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}", self.table.file_name(), self.line)?;
        if let Some(key) = self.key {
            write!(f, " (id {})", key)?;
        }
        write!(f, ": {}", self.reason())
    }
}

impl Serialize for RowIssue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let category = match self.kind {
            IssueKind::Parse(_) => "row_parse",
            IssueKind::MissingEndpoint(_) => "missing_endpoint",
        };
        let mut s = serializer.serialize_struct("RowIssue", 5)?;
        s.serialize_field("table", self.table.file_name())?;
        s.serialize_field("line", &self.line)?;
        s.serialize_field("key", &self.key)?;
        s.serialize_field("category", category)?;
        s.serialize_field("reason", &self.reason())?;
        s.end()
    }
}
