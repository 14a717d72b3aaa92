//! Solver collaborator boundary
//!
//! A backend receives an immutable netlist plus an analysis directive and
//! returns raw sample columns, or a diagnostic. It never sees the graph.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::analysis::AnalysisCmd;
use crate::error::CircuitError;
use crate::netlist::Netlist;

/// Cooperative cancellation flag shared between the engine and a backend.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub netlist: Arc<Netlist>,
    pub analysis: AnalysisCmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Time,
    Sweep,
    Voltage,
    Current,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVariable {
    pub name: String,
    pub kind: VarKind,
}

impl RawVariable {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Rawfile-shaped output: ordered variables and row-major points.
///
/// For transient and swept runs the first variable is the axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub plot_name: String,
    pub variables: Vec<RawVariable>,
    pub points: Vec<Vec<f64>>,
}

impl RawOutput {
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.points
            .iter()
            .filter_map(|row| row.get(index).copied())
            .collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|var| var.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverFailure {
    /// Solver-reported failure, kept verbatim.
    #[error("{0}")]
    Diagnostic(String),
    #[error("solver unavailable: {0}")]
    Unavailable(String),
    #[error("solver timed out after {0} s")]
    Timeout(u64),
    #[error("solver run cancelled")]
    Cancelled,
}

impl From<SolverFailure> for CircuitError {
    fn from(failure: SolverFailure) -> Self {
        match failure {
            SolverFailure::Cancelled => CircuitError::Cancelled,
            SolverFailure::Diagnostic(diagnostic) => CircuitError::SimulationFailed { diagnostic },
            other => CircuitError::SimulationFailed {
                diagnostic: other.to_string(),
            },
        }
    }
}

pub trait SolverBackend: Send {
    fn name(&self) -> &'static str;

    fn solve(
        &mut self,
        request: &SolveRequest,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure>;
}

impl SolverBackend for Box<dyn SolverBackend> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn solve(
        &mut self,
        request: &SolveRequest,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure> {
        self.as_mut().solve(request, cancel)
    }
}
