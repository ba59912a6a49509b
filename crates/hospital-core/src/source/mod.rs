//! CSV sources: one file per table, read with explicit per-row coercion.
//!
//! Rows that fail coercion are recorded as [`RowIssue`]s and left out of the
//! parsed table; the rest of the file keeps loading.

pub mod records;

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EtlError, EtlResult, RowParseError};
use crate::issue::RowIssue;
use crate::model::{Hospital, Patient, Payer, Physician};
pub use records::{ReviewRow, SourceRecord, VisitRow};
use records::{HospitalCsv, PatientCsv, PayerCsv, PhysicianCsv, ReviewCsv, VisitCsv};

/// The six source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Hospitals,
    Payers,
    Physicians,
    Patients,
    Visits,
    Reviews,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Hospitals,
        Table::Payers,
        Table::Physicians,
        Table::Patients,
        Table::Visits,
        Table::Reviews,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Hospitals => "hospitals",
            Table::Payers => "payers",
            Table::Physicians => "physicians",
            Table::Patients => "patients",
            Table::Visits => "visits",
            Table::Reviews => "reviews",
        }
    }

    /// Conventional file name inside a data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Table::Hospitals => "hospitals.csv",
            Table::Payers => "payers.csv",
            Table::Physicians => "physicians.csv",
            Table::Patients => "patients.csv",
            Table::Visits => "visits.csv",
            Table::Reviews => "reviews.csv",
        }
    }

    /// Environment variable that overrides this table's path.
    pub fn env_var(&self) -> &'static str {
        match self {
            Table::Hospitals => "HOSPITALS_CSV_PATH",
            Table::Payers => "PAYERS_CSV_PATH",
            Table::Physicians => "PHYSICIANS_CSV_PATH",
            Table::Patients => "PATIENTS_CSV_PATH",
            Table::Visits => "VISITS_CSV_PATH",
            Table::Reviews => "REVIEWS_CSV_PATH",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Locations of the six CSV files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub hospitals: PathBuf,
    pub payers: PathBuf,
    pub physicians: PathBuf,
    pub patients: PathBuf,
    pub visits: PathBuf,
    pub reviews: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self::from_dir("data")
    }
}

impl SourcePaths {
    /// All six tables under `dir` with their conventional file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            hospitals: dir.join(Table::Hospitals.file_name()),
            payers: dir.join(Table::Payers.file_name()),
            physicians: dir.join(Table::Physicians.file_name()),
            patients: dir.join(Table::Patients.file_name()),
            visits: dir.join(Table::Visits.file_name()),
            reviews: dir.join(Table::Reviews.file_name()),
        }
    }

    pub fn get(&self, table: Table) -> &Path {
        match table {
            Table::Hospitals => &self.hospitals,
            Table::Payers => &self.payers,
            Table::Physicians => &self.physicians,
            Table::Patients => &self.patients,
            Table::Visits => &self.visits,
            Table::Reviews => &self.reviews,
        }
    }

    /// Set a table's path. Accepts plain paths and `file://` URIs.
    pub fn set(&mut self, table: Table, location: &str) {
        let path = PathBuf::from(strip_file_uri(location));
        match table {
            Table::Hospitals => self.hospitals = path,
            Table::Payers => self.payers = path,
            Table::Physicians => self.physicians = path,
            Table::Patients => self.patients = path,
            Table::Visits => self.visits = path,
            Table::Reviews => self.reviews = path,
        }
    }
}

/// `file:///data/x.csv` -> `/data/x.csv`; anything else is returned unchanged.
pub fn strip_file_uri(location: &str) -> &str {
    location.strip_prefix("file://").unwrap_or(location)
}

/// A parsed value and the source line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub line: u64,
    pub value: T,
}

impl<T> Sourced<T> {
    pub fn new(line: u64, value: T) -> Self {
        Self { line, value }
    }
}

/// Parsed rows of one table plus the rows that were skipped.
#[derive(Debug, Clone)]
pub struct SourceTable<T> {
    pub rows: Vec<Sourced<T>>,
    pub issues: Vec<RowIssue>,
}

impl<T> Default for SourceTable<T> {
    fn default() -> Self {
        Self { rows: Vec::new(), issues: Vec::new() }
    }
}

/// Read and coerce a whole table from a file.
pub fn read_table<R: SourceRecord>(path: &Path) -> EtlResult<SourceTable<R::Parsed>> {
    let file = File::open(path).map_err(|e| EtlError::Source {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    read_table_from::<R, _>(file, &path.display().to_string())
}

/// Read and coerce a whole table from any reader. `origin` names it in errors.
pub fn read_table_from<R: SourceRecord, Rd: io::Read>(
    reader: Rd,
    origin: &str,
) -> EtlResult<SourceTable<R::Parsed>> {
    let source_err = |message: String| EtlError::Source { path: origin.to_string(), message };

    // Text fields are kept as given; typed fields are trimmed by `coerce`.
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers().map_err(|e| source_err(e.to_string()))?.clone();

    let mut table = SourceTable::default();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    return Err(source_err(e.to_string()));
                }
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                push_issue(&mut table, RowIssue::parse(R::TABLE, line, None, malformed(&e.to_string())));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw: R = match record.deserialize(Some(&headers)) {
            Ok(raw) => raw,
            Err(e) => {
                push_issue(&mut table, RowIssue::parse(R::TABLE, line, None, malformed(&e.to_string())));
                continue;
            }
        };

        let key = raw.key();
        match raw.parse() {
            Ok(value) => table.rows.push(Sourced::new(line, value)),
            Err(e) => push_issue(&mut table, RowIssue::parse(R::TABLE, line, key, e)),
        }
    }

    debug!(table = %R::TABLE, rows = table.rows.len(), skipped = table.issues.len(), "Read source table");
    Ok(table)
}

fn malformed(message: &str) -> RowParseError {
    RowParseError::new("record", message, "columns matching the header")
}

fn push_issue<T>(table: &mut SourceTable<T>, issue: RowIssue) {
    warn!(%issue, "Skipping source row");
    table.issues.push(issue);
}

/// All six tables, parsed, with every coercion issue collected.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub hospitals: Vec<Sourced<Hospital>>,
    pub payers: Vec<Sourced<Payer>>,
    pub physicians: Vec<Sourced<Physician>>,
    pub patients: Vec<Sourced<Patient>>,
    pub visits: Vec<Sourced<VisitRow>>,
    pub reviews: Vec<Sourced<ReviewRow>>,
    pub issues: Vec<RowIssue>,
}

impl Dataset {
    /// Read all six sources. A missing or unreadable file is fatal.
    pub fn load(paths: &SourcePaths) -> EtlResult<Self> {
        let mut dataset = Dataset::default();

        let hospitals = read_table::<HospitalCsv>(paths.get(Table::Hospitals))?;
        dataset.hospitals = dataset.absorb(hospitals);
        let payers = read_table::<PayerCsv>(paths.get(Table::Payers))?;
        dataset.payers = dataset.absorb(payers);
        let physicians = read_table::<PhysicianCsv>(paths.get(Table::Physicians))?;
        dataset.physicians = dataset.absorb(physicians);
        let patients = read_table::<PatientCsv>(paths.get(Table::Patients))?;
        dataset.patients = dataset.absorb(patients);
        let visits = read_table::<VisitCsv>(paths.get(Table::Visits))?;
        dataset.visits = dataset.absorb(visits);
        let reviews = read_table::<ReviewCsv>(paths.get(Table::Reviews))?;
        dataset.reviews = dataset.absorb(reviews);

        Ok(dataset)
    }

    fn absorb<T>(&mut self, table: SourceTable<T>) -> Vec<Sourced<T>> {
        self.issues.extend(table.issues);
        table.rows
    }

    /// Number of rows that parsed successfully across all tables.
    pub fn row_count(&self) -> usize {
        self.hospitals.len()
            + self.payers.len()
            + self.physicians.len()
            + self.patients.len()
            + self.visits.len()
            + self.reviews.len()
    }
}
