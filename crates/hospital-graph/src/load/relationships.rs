//! Relationship loaders.
//!
//! Graph structure built from the visit and review rows:
//! - (:Visit)-[:AT]->(:Hospital)
//! - (:Visit)-[:WRITES]->(:Review)
//! - (:Physician)-[:TREATS]->(:Visit)
//! - (:Visit)-[:COVERED_BY {service_date, billing_amount}]->(:Payer)
//! - (:Patient)-[:HAS]->(:Visit)
//! - (:Hospital)-[:EMPLOYS]->(:Physician), inferred from visits
//!
//! A row whose endpoint node is absent is recorded and skipped.

use tracing::{debug, info, warn};

use hospital_core::{Dataset, EtlResult, MissingEndpointError, Properties, RelKind, RowIssue, Table};

use crate::store::{EdgeOutcome, EdgeWrite, GraphStore};

/// One edge to write and the source row it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub table: Table,
    pub line: u64,
    pub key: i64,
    pub edge: EdgeWrite,
}

/// Edge writes for `kind`, in source order.
///
/// Visits without a payer produce no COVERED_BY row. EMPLOYS yields one row
/// per visit; the merge collapses repeated (hospital, physician) pairs.
pub fn edge_rows(dataset: &Dataset, kind: RelKind) -> Vec<EdgeRow> {
    if kind == RelKind::Writes {
        return dataset
            .reviews
            .iter()
            .map(|row| EdgeRow {
                table: Table::Reviews,
                line: row.line,
                key: row.value.review.id,
                edge: EdgeWrite::new(kind, row.value.visit_id, row.value.review.id),
            })
            .collect();
    }

    dataset
        .visits
        .iter()
        .filter_map(|row| {
            let v = &row.value;
            let visit_id = v.visit.id;
            let edge = match kind {
                RelKind::At => EdgeWrite::new(kind, visit_id, v.hospital_id),
                RelKind::Treats => EdgeWrite::new(kind, v.physician_id, visit_id),
                RelKind::Has => EdgeWrite::new(kind, v.patient_id, visit_id),
                RelKind::Employs => EdgeWrite::new(kind, v.hospital_id, v.physician_id),
                RelKind::CoveredBy => EdgeWrite::new(kind, visit_id, v.payer_id?).with_properties(
                    Properties::new()
                        .with("service_date", v.visit.discharge_date.clone())
                        .with("billing_amount", v.billing_amount),
                ),
                RelKind::Writes => return None,
            };
            Some(EdgeRow { table: Table::Visits, line: row.line, key: visit_id, edge })
        })
        .collect()
}

/// Merge every edge of `kind` whose endpoints exist.
///
/// Returns the number of merged rows; skipped rows are appended to `issues`.
pub async fn load_relationships<S: GraphStore + ?Sized>(
    store: &S,
    dataset: &Dataset,
    kind: RelKind,
    issues: &mut Vec<RowIssue>,
) -> EtlResult<usize> {
    info!("Loading '{}' relationships", kind);

    let mut merged = 0;
    let mut skipped = 0;
    for row in edge_rows(dataset, kind) {
        match store.merge_edge(&row.edge).await? {
            EdgeOutcome::Merged => merged += 1,
            EdgeOutcome::MissingEndpoint { kind: missing, id } => {
                let issue = RowIssue::missing_endpoint(
                    row.table,
                    row.line,
                    Some(row.key),
                    MissingEndpointError { relationship: kind, missing, id },
                );
                warn!(%issue, "Skipping relationship row");
                issues.push(issue);
                skipped += 1;
            }
        }
    }

    debug!(rel = %kind, merged, skipped, "Relationship load complete");
    Ok(merged)
}
