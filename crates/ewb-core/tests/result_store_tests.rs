mod common;

use std::time::Duration;

use common::source_and_load;
use ewb_core::{
    AnalysisCmd, AnalysisKind, Axis, Fingerprint, NetlistBuilder, ResultStore, RunId, SimulationResult,
};

fn fingerprint(ohms: f64) -> Fingerprint {
    let (graph, _, _) = source_and_load(5.0, ohms);
    NetlistBuilder::new().build(&graph.snapshot()).unwrap().fingerprint()
}

fn op_result(volts: f64) -> SimulationResult {
    SimulationResult {
        analysis: AnalysisKind::Dc,
        axis: None,
        variables: [("v(n1)".to_string(), vec![volts])].into_iter().collect(),
    }
}

#[test]
fn run_ids_start_at_one_and_increase() {
    let mut store = ResultStore::new(8);
    let fp = fingerprint(10.0);
    let a = store.add_run(AnalysisCmd::operating_point(), fp, "native", Duration::ZERO, op_result(1.0));
    let b = store.add_run(AnalysisCmd::operating_point(), fp, "native", Duration::ZERO, op_result(2.0));
    assert_eq!(a, RunId(1));
    assert_eq!(b, RunId(2));
    assert_eq!(store.latest().unwrap().id, b);
    assert_eq!(store.get(a).unwrap().result.final_value("V(N1)"), Some(1.0));
}

#[test]
fn oldest_runs_are_evicted_at_capacity() {
    let mut store = ResultStore::new(2);
    let fp = fingerprint(10.0);
    let ids: Vec<RunId> = (0..3)
        .map(|i| {
            store.add_run(
                AnalysisCmd::operating_point(),
                fp,
                "native",
                Duration::ZERO,
                op_result(i as f64),
            )
        })
        .collect();
    assert_eq!(store.len(), 2);
    assert!(store.get(ids[0]).is_none());
    assert!(store.get(ids[2]).is_some());
}

#[test]
fn find_matches_fingerprint_and_analysis() {
    let mut store = ResultStore::default();
    let fp10 = fingerprint(10.0);
    let fp20 = fingerprint(20.0);
    let op = store.add_run(AnalysisCmd::operating_point(), fp10, "native", Duration::ZERO, op_result(5.0));

    assert_eq!(store.find(fp10, &AnalysisCmd::operating_point()).unwrap().id, op);
    assert!(store.find(fp20, &AnalysisCmd::operating_point()).is_none());
    assert!(store.find(fp10, &AnalysisCmd::transient(1e-6, 1e-3)).is_none());
}

#[test]
fn sample_count_prefers_the_axis() {
    let result = SimulationResult {
        analysis: AnalysisKind::Transient,
        axis: Some(Axis {
            name: "time".to_string(),
            values: vec![0.0, 1e-3, 2e-3],
        }),
        variables: [("v(n1)".to_string(), vec![0.0, 0.5, 0.75])].into_iter().collect(),
    };
    assert_eq!(result.sample_count(), 3);
    assert_eq!(result.final_value("v(n1)"), Some(0.75));
    assert_eq!(result.variable_names().collect::<Vec<_>>(), vec!["v(n1)"]);
    assert!(result.current("r1").is_none());
}
