//! End-to-end load scenarios against the in-memory store.

use std::fs;
use std::path::Path;
use std::time::Duration;

use hospital_core::{EtlError, GraphNode, IssueKind, NodeKind, RelKind, SourcePaths, Table};
use hospital_graph::{
    graph_counts, top_diagnoses, visits_per_hospital, GraphLoader, GraphStore, LoadReport,
    MemoryConnector, MemoryGraph, RetryPolicy,
};
use tempfile::TempDir;

const HOSPITALS: &str = "hospital_id,hospital_name,hospital_state\n\
                         1,City General,CA\n";
const PAYERS: &str = "payer_id,payer_name\n\
                      1,Medicaid\n";
const PHYSICIANS: &str =
    "physician_id,physician_name,physician_dob,physician_grad_year,medical_school,salary\n\
     1,Dr. Sarah Johnson,1970-03-14,1996,Harvard,310000.50\n";
const PATIENTS: &str = "patient_id,patient_name,patient_sex,patient_dob,patient_blood_type\n\
                        1,John Smith,Male,1980-02-11,O+\n";
const VISIT_HEADER: &str = "visit_id,patient_id,hospital_id,physician_id,payer_id,room_number,\
                            admission_type,date_of_admission,test_results,visit_status,\
                            chief_complaint,treatment_description,primary_diagnosis,\
                            discharge_date,billing_amount\n";
const VISIT_ONE: &str =
    "1,1,1,1,1,101,Emergency,2024-01-02,Abnormal,DISCHARGED,Cough,Antibiotics,Pneumonia,2024-01-09,12500.75\n";
const REVIEWS: &str = "review_id,visit_id,review,patient_name,physician_name,hospital_name\n\
                       1,1,Great care,John Smith,Dr. Sarah Johnson,City General\n";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(visits: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| fs::write(dir.path().join(name), body).unwrap();
        write("hospitals.csv", HOSPITALS);
        write("payers.csv", PAYERS);
        write("physicians.csv", PHYSICIANS);
        write("patients.csv", PATIENTS);
        write("visits.csv", &format!("{}{}", VISIT_HEADER, visits));
        write("reviews.csv", REVIEWS);
        Self { dir }
    }

    fn scenario() -> Self {
        Self::new(VISIT_ONE)
    }

    fn replace(&self, file: &str, body: &str) {
        fs::write(self.dir.path().join(file), body).unwrap();
    }

    fn paths(&self) -> SourcePaths {
        SourcePaths::from_dir(self.dir.path())
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn loader(graph: &MemoryGraph) -> GraphLoader<MemoryConnector> {
    GraphLoader::new(
        MemoryConnector::new(graph.clone()),
        RetryPolicy::new(5, Duration::from_millis(1)),
    )
}

async fn load(graph: &MemoryGraph, fixture: &Fixture) -> LoadReport {
    loader(graph).run_full_load(&fixture.paths()).await.unwrap()
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.attempts, 1);

    let counts = graph_counts(&graph).await.unwrap();
    for kind in NodeKind::ALL {
        assert_eq!(counts.nodes[&kind], 1, "{kind} count");
    }
    for kind in RelKind::ALL {
        assert_eq!(counts.relationships[&kind], 1, "{kind} count");
    }

    let hospitals = graph.find_nodes(NodeKind::Hospital, &[], None).await.unwrap();
    match &hospitals[0] {
        GraphNode::Hospital(h) => {
            assert_eq!(h.name, "City General");
            assert_eq!(h.state_name, "CA");
        }
        other => panic!("unexpected node {other:?}"),
    }

    let visits = graph.find_nodes(NodeKind::Visit, &[], None).await.unwrap();
    match &visits[0] {
        GraphNode::Visit(v) => {
            assert_eq!(v.diagnosis, "Pneumonia");
            assert_eq!(v.room_number, 101);
            assert_eq!(v.discharge_date.as_deref(), Some("2024-01-09"));
        }
        other => panic!("unexpected node {other:?}"),
    }

    let covered = graph.find_edges(RelKind::CoveredBy).await.unwrap();
    assert_eq!(covered[0].properties.float("billing_amount").unwrap(), 12500.75);
    assert_eq!(covered[0].properties.text("service_date").unwrap(), "2024-01-09");

    assert_eq!(graph.open_handles(), 0);
}

#[tokio::test]
async fn test_second_load_changes_nothing() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();

    load(&graph, &fixture).await;
    let first = graph_counts(&graph).await.unwrap();
    let first_nodes = graph.find_nodes(NodeKind::Visit, &[], None).await.unwrap();

    load(&graph, &fixture).await;
    assert_eq!(graph_counts(&graph).await.unwrap(), first);
    assert_eq!(graph.find_nodes(NodeKind::Visit, &[], None).await.unwrap(), first_nodes);
}

#[tokio::test]
async fn test_duplicate_ids_collapse_to_one_node() {
    let fixture = Fixture::scenario();
    fixture.replace(
        "hospitals.csv",
        "hospital_id,hospital_name,hospital_state\n\
         1,City General,CA\n\
         1,City General Hospital,CA\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert_eq!(report.nodes[&NodeKind::Hospital], 2);
    assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 1);
    assert_eq!(graph.constraints(), NodeKind::ALL.to_vec());

    // Last row wins.
    let hospitals = graph.find_nodes(NodeKind::Hospital, &[], None).await.unwrap();
    assert_eq!(hospitals[0].display_name(), "City General Hospital");
}

#[tokio::test]
async fn test_unknown_payer_skips_only_covered_by() {
    let fixture = Fixture::new(
        "1,1,1,1,99,101,Emergency,2024-01-02,Abnormal,DISCHARGED,Cough,Antibiotics,Pneumonia,2024-01-09,12500.75\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert_eq!(graph.count_edges(RelKind::CoveredBy).await.unwrap(), 0);
    assert_eq!(graph.count_edges(RelKind::At).await.unwrap(), 1);
    assert_eq!(graph.count_nodes(NodeKind::Visit).await.unwrap(), 1);

    assert_eq!(report.skipped_rows(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.table, Table::Visits);
    assert_eq!(issue.line, 2);
    assert_eq!(issue.key, Some(1));
    match &issue.kind {
        IssueKind::MissingEndpoint(e) => {
            assert_eq!(e.relationship, RelKind::CoveredBy);
            assert_eq!(e.missing, NodeKind::Payer);
            assert_eq!(e.id, 99);
        }
        other => panic!("unexpected issue {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_hospital_counts_one_skipped_row() {
    let fixture = Fixture::new(
        "1,1,99,1,1,101,Emergency,2024-01-02,Abnormal,DISCHARGED,Cough,Antibiotics,Pneumonia,2024-01-09,12500.75\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert_eq!(graph.count_edges(RelKind::At).await.unwrap(), 0);
    assert_eq!(graph.count_edges(RelKind::Employs).await.unwrap(), 0);
    assert_eq!(graph.count_edges(RelKind::Treats).await.unwrap(), 1);

    let lost: Vec<RelKind> = report
        .issues
        .iter()
        .filter_map(|issue| match &issue.kind {
            IssueKind::MissingEndpoint(e) => Some(e.relationship),
            IssueKind::Parse(_) => None,
        })
        .collect();
    assert_eq!(lost, vec![RelKind::At, RelKind::Employs]);
    assert_eq!(report.issue_count(), 2);
    assert_eq!(report.skipped_rows(), 1);
}

#[tokio::test]
async fn test_empty_payer_means_no_edge_and_no_issue() {
    let fixture = Fixture::new(
        "1,1,1,1,,101,Emergency,2024-01-02,Abnormal,ADMITTED,Cough,Antibiotics,Pneumonia,,\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    assert_eq!(graph.count_edges(RelKind::CoveredBy).await.unwrap(), 0);
    assert_eq!(graph.count_edges(RelKind::Has).await.unwrap(), 1);
}

#[tokio::test]
async fn test_bad_salary_is_recorded_and_not_written() {
    let fixture = Fixture::scenario();
    fixture.replace(
        "physicians.csv",
        "physician_id,physician_name,physician_dob,physician_grad_year,medical_school,salary\n\
         1,Dr. Sarah Johnson,1970-03-14,1996,Harvard,310000.50\n\
         2,Dr. Michael Chen,1975-07-01,2001,Stanford,abc\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert_eq!(graph.count_nodes(NodeKind::Physician).await.unwrap(), 1);
    assert_eq!(report.skipped_rows(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.table, Table::Physicians);
    assert_eq!(issue.key, Some(2));
    match &issue.kind {
        IssueKind::Parse(e) => {
            assert_eq!(e.field, "salary");
            assert_eq!(e.value, "abc");
        }
        other => panic!("unexpected issue {other:?}"),
    }
}

#[tokio::test]
async fn test_employs_is_one_edge_per_pair() {
    let fixture = Fixture::new(
        "1,1,1,1,1,101,Emergency,2024-01-02,Abnormal,DISCHARGED,Cough,Antibiotics,Pneumonia,2024-01-09,100\n\
         2,1,1,1,1,102,Urgent,2024-02-02,Normal,DISCHARGED,Fever,Fluids,Influenza,2024-02-04,200\n\
         3,1,1,1,1,103,Elective,2024-03-02,Normal,DISCHARGED,Checkup,Observation,Pneumonia,2024-03-03,300\n",
    );
    let graph = MemoryGraph::new();
    let report = load(&graph, &fixture).await;

    assert_eq!(report.relationships[&RelKind::Employs], 3);
    assert_eq!(graph.count_edges(RelKind::Employs).await.unwrap(), 1);
    assert!(graph.has_edge(RelKind::Employs, 1, 1));
    assert_eq!(graph.count_edges(RelKind::Treats).await.unwrap(), 3);

    let busiest = visits_per_hospital(&graph).await.unwrap();
    assert_eq!(busiest[0].visits, 3);
    let top = top_diagnoses(&graph, 1).await.unwrap();
    assert_eq!(top[0].diagnosis, "Pneumonia");
    assert_eq!(top[0].count, 2);
}

#[tokio::test]
async fn test_reload_refreshes_covered_by_properties() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();
    load(&graph, &fixture).await;

    fixture.replace(
        "visits.csv",
        &format!(
            "{}1,1,1,1,1,101,Emergency,2024-01-02,Abnormal,DISCHARGED,Cough,Antibiotics,Pneumonia,2024-01-12,9800.25\n",
            VISIT_HEADER
        ),
    );
    let report = load(&graph, &fixture).await;
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);

    let covered = graph.find_edges(RelKind::CoveredBy).await.unwrap();
    assert_eq!(covered.len(), 1);
    assert_eq!(covered[0].properties.float("billing_amount").unwrap(), 9800.25);
    assert_eq!(covered[0].properties.text("service_date").unwrap(), "2024-01-12");

    let visits = graph.find_nodes(NodeKind::Visit, &[], None).await.unwrap();
    assert_eq!(visits.len(), 1);
    match &visits[0] {
        GraphNode::Visit(v) => assert_eq!(v.discharge_date.as_deref(), Some("2024-01-12")),
        other => panic!("unexpected node {other:?}"),
    }
}

#[tokio::test]
async fn test_refused_connections_within_bound_load_normally() {
    let fixture = Fixture::scenario();

    let direct = MemoryGraph::new();
    load(&direct, &fixture).await;

    let delayed = MemoryGraph::new();
    let loader = GraphLoader::new(
        MemoryConnector::new(delayed.clone()).refuse_first(3),
        RetryPolicy::new(5, Duration::from_millis(1)),
    );
    let report = loader.run_full_load(&fixture.paths()).await.unwrap();

    assert_eq!(report.attempts, 4);
    assert_eq!(loader.connector().attempts(), 4);
    assert_eq!(graph_counts(&delayed).await.unwrap(), graph_counts(&direct).await.unwrap());
    assert_eq!(delayed.open_handles(), 0);
}

#[tokio::test]
async fn test_exhausted_retries_are_fatal() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();
    let loader = GraphLoader::new(
        MemoryConnector::new(graph.clone()).refuse_first(10),
        RetryPolicy::new(2, Duration::from_millis(1)),
    );

    let err = loader.run_full_load(&fixture.paths()).await.unwrap_err();
    assert!(matches!(err, EtlError::Connection { attempts: 2, .. }));
    assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_fail_on_first_attempt() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();
    let loader = GraphLoader::new(
        MemoryConnector::new(graph.clone()).reject_credentials(),
        RetryPolicy::new(100, Duration::from_secs(10)),
    );

    let err = loader.run_full_load(&fixture.paths()).await.unwrap_err();
    assert!(matches!(err, EtlError::Rejected(_)));
    assert_eq!(loader.connector().attempts(), 1);
    assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 0);
}

#[tokio::test]
async fn test_constraint_failure_closes_connection() {
    let fixture = Fixture::scenario();
    let graph = MemoryGraph::new();
    graph.reject_constraints(true);

    let err = loader(&graph).run_full_load(&fixture.paths()).await.unwrap_err();
    assert!(matches!(err, EtlError::ConstraintSetup { .. }));
    assert_eq!(graph.open_handles(), 0);
}

#[tokio::test]
async fn test_reset_replaces_previous_graph() {
    let graph = MemoryGraph::new();

    let old = Fixture::scenario();
    old.replace(
        "hospitals.csv",
        "hospital_id,hospital_name,hospital_state\n\
         1,City General,CA\n\
         2,Closed Clinic,NV\n",
    );
    load(&graph, &old).await;
    assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 2);

    let fresh = Fixture::scenario();
    let report = loader(&graph).run_full_reset(&fresh.paths()).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(graph.count_nodes(NodeKind::Hospital).await.unwrap(), 1);
    assert_eq!(graph.count_edges(RelKind::At).await.unwrap(), 1);
    assert_eq!(graph.open_handles(), 0);
}

#[tokio::test]
async fn test_file_uri_paths_are_accepted() {
    let fixture = Fixture::scenario();
    let mut paths = fixture.paths();
    let hospitals = fixture.path().join("hospitals.csv");
    paths.set(Table::Hospitals, &format!("file://{}", hospitals.display()));

    let graph = MemoryGraph::new();
    let report = loader(&graph).run_full_load(&paths).await.unwrap();
    assert_eq!(report.nodes[&NodeKind::Hospital], 1);
}
