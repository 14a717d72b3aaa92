//! Circuit graph, netlist builder and simulation engine
//!
//! ## Module Structure
//!
//! - `graph`: editable `CircuitGraph` of components, terminals and wires
//! - `topology`: terminal partition into electrical nodes
//! - `validate`: ground resolution and structural warnings
//! - `netlist`: immutable `Netlist` built from a snapshot, with fingerprint
//! - `analysis`: transient and DC directives
//! - `engine`: single-flight `SimulationEngine` and `RunHandle`
//! - `backend`: solver boundary, implemented by `native` and `ngspice`
//! - `mna`, `stamp`, `solver`: the native MNA formulation
//! - `raw`: SPICE rawfile parsing
//! - `result_store`, `psf`: completed runs and text export
//!
//! ## Usage
//!
//! ```
//! use ewb_core::{AnalysisCmd, CircuitGraph, ComponentKind, EngineConfig, ParameterSet, Position, SimulationEngine};
//!
//! let mut graph = CircuitGraph::new();
//! let source = graph.add_component(
//!     ComponentKind::VoltageSource,
//!     ParameterSet::new().with("voltage", 5.0),
//!     Position::default(),
//! );
//! let load = graph.add_component(
//!     ComponentKind::Resistor,
//!     ParameterSet::new().with("resistance", 10.0),
//!     Position::default(),
//! );
//! let (v_pos, v_neg) = (graph.terminal_at(source, 0).unwrap(), graph.terminal_at(source, 1).unwrap());
//! let (r_a, r_b) = (graph.terminal_at(load, 0).unwrap(), graph.terminal_at(load, 1).unwrap());
//! graph.add_wire(v_pos, r_a).unwrap();
//! graph.add_wire(r_b, v_neg).unwrap();
//!
//! let engine = SimulationEngine::new(EngineConfig::default());
//! let record = engine.simulate(&graph, AnalysisCmd::operating_point()).unwrap().wait().unwrap();
//! let current = record.result.final_value("i(r2)").unwrap();
//! assert!((current - 0.5).abs() < 1e-6);
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod mna;
pub mod native;
pub mod netlist;
pub mod ngspice;
pub mod psf;
pub mod raw;
pub mod result_store;
pub mod session;
pub mod solver;
pub mod stamp;
pub mod topology;
pub mod validate;

pub use analysis::{AnalysisCmd, AnalysisKind, DcSweep};
pub use backend::{CancelToken, RawOutput, RawVariable, SolveRequest, SolverBackend, SolverFailure, VarKind};
pub use config::{BackendChoice, BusyPolicy, ConfigError, EngineConfig, NgspiceConfig};
pub use engine::{RunHandle, SimulationEngine};
pub use error::{CircuitError, Result};
pub use graph::{CircuitGraph, CircuitSnapshot, Component, ComponentId, Position, Terminal, TerminalId, Wire, WireId};
pub use native::NativeBackend;
pub use netlist::{Fingerprint, Netlist, NetlistBuilder};
pub use ngspice::NgspiceBackend;
pub use result_store::{Axis, ResultStore, RunId, RunRecord, SimulationResult};
pub use session::RunState;
pub use topology::{NodeId, NodePartition};
pub use validate::{GroundResolution, ValidationReport, ValidationWarning};

pub use ewb_devices::{ComponentKind, NodeRef, ParameterSet, SourceWaveform, TerminalRole};
