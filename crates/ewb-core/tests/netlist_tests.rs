mod common;

use common::{connect, place, rc_step, source_and_load};
use ewb_core::{
    AnalysisCmd, CircuitError, CircuitGraph, ComponentKind, DcSweep, GroundResolution, NetlistBuilder,
    NodeRef, Position,
};

fn build(graph: &CircuitGraph) -> ewb_core::Result<ewb_core::Netlist> {
    NetlistBuilder::new().build(&graph.snapshot())
}

#[test]
fn source_return_becomes_node_zero() {
    let (graph, source, load) = source_and_load(5.0, 10.0);
    let netlist = build(&graph).unwrap();

    assert!(matches!(netlist.ground(), GroundResolution::Default(_)));
    assert_eq!(netlist.node_names(), &["0".to_string(), "n1".to_string()]);
    let negative = graph.terminal_at(source, 1).unwrap();
    assert_eq!(netlist.terminal_node(negative), Some(NodeRef::GROUND));

    let v1 = netlist.device("v1").expect("v1 emitted");
    assert_eq!(v1.nodes, vec![NodeRef(1), NodeRef::GROUND]);
    assert_eq!(netlist.component_of("R2"), Some(load));
}

#[test]
fn deck_lists_devices_probes_and_directive() {
    let (graph, _, _) = source_and_load(5.0, 10.0);
    let netlist = NetlistBuilder::new()
        .with_title("divider")
        .build(&graph.snapshot())
        .unwrap();
    let deck = netlist.to_spice(&AnalysisCmd::operating_point());
    let lines: Vec<&str> = deck.lines().collect();
    assert_eq!(
        lines,
        vec!["* divider", "V1 n1 0 DC 5", "R2 n1 0 10", ".save all @r2[i]", ".op", ".end"]
    );

    let tran = netlist.to_spice(&AnalysisCmd::transient(1e-6, 1e-3));
    assert!(tran.contains(".tran 1u 1m\n"));
}

#[test]
fn ground_component_emits_no_device() {
    let graph = rc_step();
    let netlist = build(&graph).unwrap();
    assert!(matches!(netlist.ground(), GroundResolution::Explicit(_)));
    let names: Vec<&str> = netlist.devices().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["V1", "R2", "C3"]);
    assert_eq!(netlist.node_count(), 3);
}

#[test]
fn fingerprint_ignores_layout_edits() {
    let (mut graph, source, _) = source_and_load(5.0, 10.0);
    let before = build(&graph).unwrap().fingerprint();
    graph.move_component(source, Position::new(40.0, -20.0)).unwrap();
    graph.set_label(source, Some("supply".to_string())).unwrap();
    assert_eq!(build(&graph).unwrap().fingerprint(), before);

    let (twin, _, _) = source_and_load(5.0, 10.0);
    assert_eq!(build(&twin).unwrap().fingerprint(), before);
}

#[test]
fn fingerprint_tracks_values_and_topology() {
    let (mut graph, source, load) = source_and_load(5.0, 10.0);
    let original = build(&graph).unwrap().fingerprint();

    graph.set_parameter(load, "resistance", 20.0).unwrap();
    let retuned = build(&graph).unwrap().fingerprint();
    assert_ne!(retuned, original);

    graph.set_parameter(load, "resistance", 10.0).unwrap();
    assert_eq!(build(&graph).unwrap().fingerprint(), original);

    let extra = place(&mut graph, ComponentKind::Resistor, &[("resistance", 10.0)]);
    connect(&mut graph, extra, 0, source, 0);
    connect(&mut graph, extra, 1, source, 1);
    assert_ne!(build(&graph).unwrap().fingerprint(), original);
}

#[test]
fn empty_or_single_node_circuits_do_not_build() {
    assert_eq!(build(&CircuitGraph::new()).unwrap_err(), CircuitError::EmptyCircuit);

    let mut graph = CircuitGraph::new();
    let r = place(&mut graph, ComponentKind::Resistor, &[]);
    connect(&mut graph, r, 0, r, 1);
    assert_eq!(build(&graph).unwrap_err(), CircuitError::EmptyCircuit);
}

#[test]
fn out_of_range_parameters_fail_the_build() {
    let (mut graph, _, load) = source_and_load(5.0, 10.0);
    graph.set_parameter(load, "resistance", -1.0).unwrap();
    match build(&graph) {
        Err(CircuitError::InvalidParameter(message)) => assert!(message.contains("R2")),
        other => panic!("expected invalid parameter, got {:?}", other),
    }

    graph.set_parameter(load, "resistance", 10.0).unwrap();
    graph.set_parameter(load, "tolerance", 0.05).unwrap();
    assert!(matches!(build(&graph), Err(CircuitError::InvalidParameter(_))));
}

#[test]
fn has_source_only_matches_independent_sources() {
    let (graph, _, _) = source_and_load(5.0, 10.0);
    let netlist = build(&graph).unwrap();
    assert!(netlist.has_source("V1"));
    assert!(netlist.has_source("v1"));
    assert!(!netlist.has_source("R2"));
    assert!(!netlist.has_source("V9"));
}

#[test]
fn sweep_directive_names_the_source() {
    let (graph, _, _) = source_and_load(5.0, 10.0);
    let netlist = build(&graph).unwrap();
    let sweep = AnalysisCmd::Dc(DcSweep::Source {
        source: "V1".to_string(),
        start: 0.0,
        stop: 5.0,
        increment: 0.5,
    });
    assert!(netlist.to_spice(&sweep).contains(".dc v1 0 5 500m\n"));
}

#[test]
fn current_sources_are_probed_like_passives() {
    let mut graph = CircuitGraph::new();
    let source = place(&mut graph, ComponentKind::CurrentSource, &[("current", 1e-3)]);
    let load = place(&mut graph, ComponentKind::Resistor, &[("resistance", 1e3)]);
    connect(&mut graph, source, 0, load, 0);
    connect(&mut graph, load, 1, source, 1);
    let deck = build(&graph).unwrap().to_spice(&AnalysisCmd::operating_point());
    assert!(deck.contains(".save all @i1[current] @r2[i]\n"), "{}", deck);
}
