#![allow(dead_code)]

use ewb_core::{CircuitGraph, ComponentId, ComponentKind, ParameterSet, Position};

pub fn place(graph: &mut CircuitGraph, kind: ComponentKind, params: &[(&str, f64)]) -> ComponentId {
    let mut set = ParameterSet::new();
    for (name, value) in params {
        set.set(name, *value);
    }
    graph.add_component(kind, set, Position::default())
}

/// Wire terminal `ia` of `a` to terminal `ib` of `b`.
pub fn connect(graph: &mut CircuitGraph, a: ComponentId, ia: usize, b: ComponentId, ib: usize) {
    let ta = graph.terminal_at(a, ia).expect("terminal a");
    let tb = graph.terminal_at(b, ib).expect("terminal b");
    graph.add_wire(ta, tb).expect("wire");
}

/// V1 across R2, no ground component. R2 pin 1 sits on V1+.
pub fn source_and_load(volts: f64, ohms: f64) -> (CircuitGraph, ComponentId, ComponentId) {
    let mut graph = CircuitGraph::new();
    let source = place(&mut graph, ComponentKind::VoltageSource, &[("voltage", volts)]);
    let load = place(&mut graph, ComponentKind::Resistor, &[("resistance", ohms)]);
    connect(&mut graph, source, 0, load, 0);
    connect(&mut graph, load, 1, source, 1);
    (graph, source, load)
}

/// V1 pulse 0 -> 1 V through R2 = 1k into C3 = 1u, with an explicit ground.
pub fn rc_step() -> CircuitGraph {
    let mut graph = CircuitGraph::new();
    let source = place(
        &mut graph,
        ComponentKind::PulseVoltageSource,
        &[
            ("initial", 0.0),
            ("pulsed", 1.0),
            ("delay", 0.0),
            ("rise", 1e-9),
            ("fall", 1e-9),
            ("width", 1.0),
            ("period", 2.0),
        ],
    );
    let r = place(&mut graph, ComponentKind::Resistor, &[("resistance", 1e3)]);
    let c = place(&mut graph, ComponentKind::Capacitor, &[("capacitance", 1e-6)]);
    let gnd = place(&mut graph, ComponentKind::Ground, &[]);
    connect(&mut graph, source, 0, r, 0);
    connect(&mut graph, r, 1, c, 0);
    connect(&mut graph, c, 1, gnd, 0);
    connect(&mut graph, source, 1, gnd, 0);
    graph
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} +/- {}, got {}",
        expected,
        tol,
        actual
    );
}
