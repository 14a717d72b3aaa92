mod common;

use common::rc_step;
use ewb_core::psf::render_psf_text;
use ewb_core::{EngineConfig, NetlistBuilder, RunId, SimulationEngine};

#[test]
fn psf_text_lists_signals_and_rows() {
    let netlist = NetlistBuilder::new().build(&rc_step().snapshot()).unwrap();
    let engine = SimulationEngine::new(EngineConfig::default());
    let result = engine.run_transient(netlist, 1e-4, 1e-3).unwrap();

    let text = render_psf_text(&result, 4);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "PSF_TEXT");
    assert_eq!(lines[1], "analysis=transient");
    assert_eq!(lines[2], "axis=time");
    assert_eq!(lines[3], "points=11");
    assert!(lines.contains(&"- v(n2)"));
    assert!(lines.contains(&"- i(r2)"));

    let values = lines.iter().position(|line| *line == "values:").unwrap();
    let rows = &lines[values + 1..];
    assert_eq!(rows.len(), 11);
    let first: Vec<&str> = rows[0].split(' ').collect();
    assert_eq!(first[0], "0.0000e0");
    assert_eq!(first.len(), result.variables.len() + 1);
}

#[test]
fn store_writes_psf_to_disk() {
    let netlist = NetlistBuilder::new().build(&rc_step().snapshot()).unwrap();
    let engine = SimulationEngine::new(EngineConfig::default());
    engine.run_transient(netlist, 1e-4, 1e-3).unwrap();
    let id = engine.last_result().unwrap().id;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rc.psf");
    engine
        .with_store(|store| store.write_psf_text(id, &path, 6))
        .unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("PSF_TEXT\n"));

    let missing = dir.path().join("missing.psf");
    assert!(engine
        .with_store(|store| store.write_psf_text(RunId(99), &missing, 6))
        .is_err());
}
