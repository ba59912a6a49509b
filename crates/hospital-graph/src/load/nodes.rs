//! Node loaders: one merge per parsed row, keyed by `id`.

use tracing::{debug, info};

use hospital_core::{Dataset, EtlResult, NodeKind, Sourced};

use crate::store::{GraphStore, NodeWrite};

/// Node writes for `kind`, in source order. Rows that failed coercion are
/// already absent from the dataset.
pub fn node_writes(dataset: &Dataset, kind: NodeKind) -> Vec<NodeWrite> {
    fn writes<T>(rows: &[Sourced<T>], f: impl Fn(&T) -> NodeWrite) -> Vec<NodeWrite> {
        rows.iter().map(|row| f(&row.value)).collect()
    }

    match kind {
        NodeKind::Hospital => writes(&dataset.hospitals, NodeWrite::of),
        NodeKind::Payer => writes(&dataset.payers, NodeWrite::of),
        NodeKind::Physician => writes(&dataset.physicians, NodeWrite::of),
        NodeKind::Patient => writes(&dataset.patients, NodeWrite::of),
        NodeKind::Visit => writes(&dataset.visits, |row| NodeWrite::of(&row.visit)),
        NodeKind::Review => writes(&dataset.reviews, |row| NodeWrite::of(&row.review)),
    }
}

/// Merge every row of `kind` into the graph. Returns the number of merges.
pub async fn load_nodes<S: GraphStore + ?Sized>(
    store: &S,
    dataset: &Dataset,
    kind: NodeKind,
) -> EtlResult<usize> {
    info!("Loading {} nodes", kind.label().to_lowercase());

    let writes = node_writes(dataset, kind);
    for write in &writes {
        store.merge_node(write).await?;
    }

    debug!(label = %kind, merged = writes.len(), "Node load complete");
    Ok(writes.len())
}
