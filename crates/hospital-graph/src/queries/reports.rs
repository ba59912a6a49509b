//! Fixed summary reports over the loaded graph.

use std::collections::BTreeMap;

use serde::Serialize;

use hospital_core::{EtlResult, GraphNode, NodeKind, RelKind};

use crate::store::GraphStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalVisits {
    pub hospital_id: i64,
    pub hospital: String,
    pub state_name: String,
    pub visits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisCount {
    pub diagnosis: String,
    pub count: usize,
}

/// Visits per hospital, busiest first. Hospitals without visits are listed
/// with zero. Ties are ordered by hospital name.
pub async fn visits_per_hospital<S: GraphStore + ?Sized>(store: &S) -> EtlResult<Vec<HospitalVisits>> {
    let mut per_hospital: BTreeMap<i64, usize> = BTreeMap::new();
    for edge in store.find_edges(RelKind::At).await? {
        *per_hospital.entry(edge.to_id).or_default() += 1;
    }

    let mut rows: Vec<HospitalVisits> = store
        .find_nodes(NodeKind::Hospital, &[], None)
        .await?
        .into_iter()
        .filter_map(|node| match node {
            GraphNode::Hospital(h) => Some(HospitalVisits {
                hospital_id: h.id,
                visits: per_hospital.get(&h.id).copied().unwrap_or(0),
                hospital: h.name,
                state_name: h.state_name,
            }),
            _ => None,
        })
        .collect();

    rows.sort_by(|a, b| b.visits.cmp(&a.visits).then_with(|| a.hospital.cmp(&b.hospital)));
    Ok(rows)
}

/// The `limit` most frequent visit diagnoses. Ties are ordered by name.
pub async fn top_diagnoses<S: GraphStore + ?Sized>(store: &S, limit: usize) -> EtlResult<Vec<DiagnosisCount>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for node in store.find_nodes(NodeKind::Visit, &[], None).await? {
        if let GraphNode::Visit(visit) = node {
            *counts.entry(visit.diagnosis).or_default() += 1;
        }
    }

    let mut rows: Vec<DiagnosisCount> = counts
        .into_iter()
        .map(|(diagnosis, count)| DiagnosisCount { diagnosis, count })
        .collect();
    // BTreeMap order already sorts ties by name; the sort is stable.
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows.truncate(limit);
    Ok(rows)
}
