use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use crate::analysis::{AnalysisCmd, AnalysisKind, DcSweep};
use crate::backend::{RawOutput, SolverFailure};
use crate::netlist::Fingerprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<f64>,
}

/// Named sample series aligned with an optional axis.
///
/// Operating points have no axis and one sample per variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub analysis: AnalysisKind,
    pub axis: Option<Axis>,
    pub variables: BTreeMap<String, Vec<f64>>,
}

impl SimulationResult {
    /// Split raw rows into columns. For transient and swept runs the first
    /// raw variable becomes the axis.
    pub fn from_raw(analysis: &AnalysisCmd, raw: RawOutput) -> Result<Self, SolverFailure> {
        if raw.variables.is_empty() {
            return Err(SolverFailure::Diagnostic(
                "solver returned no variables".to_string(),
            ));
        }
        if let Some((index, row)) = raw
            .points
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != raw.variables.len())
        {
            return Err(SolverFailure::Diagnostic(format!(
                "point {} has {} values for {} variables",
                index,
                row.len(),
                raw.variables.len()
            )));
        }

        let has_axis = !matches!(analysis, AnalysisCmd::Dc(DcSweep::OperatingPoint));
        let axis = has_axis.then(|| Axis {
            name: match analysis {
                AnalysisCmd::Dc(DcSweep::Source { source, .. }) => source.to_ascii_lowercase(),
                _ => "time".to_string(),
            },
            values: raw.column(0),
        });
        let skip = usize::from(has_axis);
        let variables = raw
            .variables
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, var)| (var.name.clone(), raw.column(index)))
            .collect();

        Ok(Self {
            analysis: analysis.kind(),
            axis,
            variables,
        })
    }

    /// Case-insensitive series lookup.
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.variables
            .get(name)
            .or_else(|| {
                self.variables
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    pub fn voltage(&self, node: &str) -> Option<&[f64]> {
        self.series(&format!("v({})", node))
    }

    pub fn current(&self, device: &str) -> Option<&[f64]> {
        self.series(&format!("i({})", device))
    }

    pub fn final_value(&self, name: &str) -> Option<f64> {
        self.series(name).and_then(|values| values.last().copied())
    }

    pub fn sample_count(&self) -> usize {
        self.axis
            .as_ref()
            .map(|axis| axis.values.len())
            .or_else(|| self.variables.values().next().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub usize);

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: RunId,
    pub analysis: AnalysisCmd,
    pub fingerprint: Fingerprint,
    pub backend: String,
    pub elapsed: Duration,
    pub result: SimulationResult,
}

/// Completed runs, oldest evicted first once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct ResultStore {
    runs: VecDeque<RunRecord>,
    next_id: usize,
    capacity: usize,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ResultStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: VecDeque::new(),
            next_id: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn add_run(
        &mut self,
        analysis: AnalysisCmd,
        fingerprint: Fingerprint,
        backend: &str,
        elapsed: Duration,
        result: SimulationResult,
    ) -> RunId {
        self.next_id += 1;
        let id = RunId(self.next_id);
        if self.runs.len() == self.capacity {
            self.runs.pop_front();
        }
        self.runs.push_back(RunRecord {
            id,
            analysis,
            fingerprint,
            backend: backend.to_string(),
            elapsed,
            result,
        });
        id
    }

    pub fn get(&self, id: RunId) -> Option<&RunRecord> {
        self.runs.iter().find(|run| run.id == id)
    }

    pub fn latest(&self) -> Option<&RunRecord> {
        self.runs.back()
    }

    /// Most recent run for the same circuit and analysis.
    pub fn find(&self, fingerprint: Fingerprint, analysis: &AnalysisCmd) -> Option<&RunRecord> {
        self.runs
            .iter()
            .rev()
            .find(|run| run.fingerprint == fingerprint && run.analysis == *analysis)
    }

    pub fn runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn write_psf_text(&self, id: RunId, path: &Path, precision: usize) -> std::io::Result<()> {
        let run = self
            .get(id)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "run not found"))?;
        crate::psf::write_psf_text(&run.result, path, precision)
    }
}
