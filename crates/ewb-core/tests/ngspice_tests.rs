mod common;

use common::{assert_close, source_and_load};
use ewb_core::{
    AnalysisCmd, BackendChoice, CircuitError, EngineConfig, NgspiceBackend, NgspiceConfig, SimulationEngine,
};

fn ngspice_engine(executable: &str) -> SimulationEngine {
    let config = EngineConfig {
        backend: BackendChoice::Ngspice,
        ngspice: NgspiceConfig {
            executable: executable.to_string(),
            timeout_secs: 10,
        },
        cache_results: false,
        ..EngineConfig::default()
    };
    SimulationEngine::new(config)
}

#[test]
fn missing_executable_fails_the_run() {
    let (graph, _, _) = source_and_load(5.0, 10.0);
    let engine = ngspice_engine("/nonexistent/ewb-ngspice");
    assert_eq!(engine.backend_name(), "ngspice");
    let err = engine
        .simulate(&graph, AnalysisCmd::operating_point())
        .unwrap()
        .wait()
        .unwrap_err();
    match err {
        CircuitError::SimulationFailed { diagnostic } => {
            assert!(diagnostic.contains("/nonexistent/ewb-ngspice"), "{}", diagnostic)
        }
        other => panic!("expected simulation failure, got {:?}", other),
    }
    assert!(!engine.is_busy());
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-ngspice");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn nonzero_exit_keeps_solver_output_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "echo 'Error: singular matrix' >&2\nexit 1");
        let (graph, _, _) = source_and_load(5.0, 10.0);
        let err = ngspice_engine(path.to_str().unwrap())
            .simulate(&graph, AnalysisCmd::operating_point())
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(
            err,
            CircuitError::SimulationFailed {
                diagnostic: "Error: singular matrix".to_string()
            }
        );
    }

    #[test]
    fn rawfile_written_by_the_process_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "Title: fake\nPlotname: Operating Point\nFlags: real\nNo. Variables: 2\nNo. Points: 1\nVariables:\n\t0\tV(n1)\tvoltage\n\t1\tv1#branch\tcurrent\nValues:\n 0\t5.0\n\t-0.5\n";
        let path = script(&dir, &format!("cat > \"$3\" <<'RAW'\n{}RAW", raw));
        let (graph, _, _) = source_and_load(5.0, 10.0);
        let record = ngspice_engine(path.to_str().unwrap())
            .simulate(&graph, AnalysisCmd::operating_point())
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(record.backend, "ngspice");
        assert_close(record.result.final_value("v(n1)").unwrap(), 5.0, 1e-12);
        assert_close(record.result.final_value("i(v1)").unwrap(), -0.5, 1e-12);
    }

    #[test]
    fn cancel_kills_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "sleep 30");
        let (graph, _, _) = source_and_load(5.0, 10.0);
        let engine = ngspice_engine(path.to_str().unwrap());
        let handle = engine.simulate(&graph, AnalysisCmd::operating_point()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        handle.cancel();
        assert_eq!(handle.wait().unwrap_err(), CircuitError::Cancelled);
        assert!(!engine.is_busy());
    }
}

#[test]
#[ignore = "requires ngspice on PATH"]
fn ngspice_operating_point_matches_native() {
    let (graph, _, _) = source_and_load(5.0, 10.0);
    assert!(NgspiceBackend::default().is_available());
    let ngspice = ngspice_engine("ngspice")
        .simulate(&graph, AnalysisCmd::operating_point())
        .unwrap()
        .wait()
        .unwrap();
    let native = SimulationEngine::new(EngineConfig::default())
        .simulate(&graph, AnalysisCmd::operating_point())
        .unwrap()
        .wait()
        .unwrap();
    for name in ["v(n1)", "i(v1)", "i(r2)"] {
        assert_close(
            ngspice.result.final_value(name).unwrap(),
            native.result.final_value(name).unwrap(),
            1e-6,
        );
    }
}

#[test]
#[ignore = "requires ngspice on PATH"]
fn ngspice_transient_runs() {
    let graph = common::rc_step();
    let record = ngspice_engine("ngspice")
        .simulate(&graph, AnalysisCmd::transient(1e-5, 5e-3))
        .unwrap()
        .wait()
        .unwrap();
    let cap = record.result.voltage("n2").unwrap();
    assert_close(*cap.last().unwrap(), 0.993, 0.02);
}
