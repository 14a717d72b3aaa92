use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CircuitError, Result};
use ewb_devices::format_spice_value;

/// Upper bound on samples per run, shared by sweeps and transient steps.
pub const MAX_POINTS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Transient,
    Dc,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Transient => f.write_str("transient"),
            AnalysisKind::Dc => f.write_str("dc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sweep", rename_all = "snake_case")]
pub enum DcSweep {
    OperatingPoint,
    /// Sweep the DC value of one independent source, named by its device
    /// name (`V1`, `I4`).
    Source {
        source: String,
        start: f64,
        stop: f64,
        increment: f64,
    },
}

impl DcSweep {
    pub fn source(source: impl Into<String>, start: f64, stop: f64, increment: f64) -> Self {
        DcSweep::Source {
            source: source.into(),
            start,
            stop,
            increment,
        }
    }

    /// Sweep values from `start` to `stop` inclusive.
    pub fn points(&self) -> Vec<f64> {
        match self {
            DcSweep::OperatingPoint => Vec::new(),
            DcSweep::Source {
                start,
                stop,
                increment,
                ..
            } => {
                let count = sweep_count(*start, *stop, *increment);
                (0..count).map(|i| start + increment * i as f64).collect()
            }
        }
    }
}

fn sweep_count(start: f64, stop: f64, increment: f64) -> usize {
    ((stop - start) / increment + 1e-9).floor() as usize + 1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisCmd {
    Transient { step: f64, end: f64 },
    Dc(DcSweep),
}

impl AnalysisCmd {
    pub fn transient(step: f64, end: f64) -> Self {
        AnalysisCmd::Transient { step, end }
    }

    pub fn operating_point() -> Self {
        AnalysisCmd::Dc(DcSweep::OperatingPoint)
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisCmd::Transient { .. } => AnalysisKind::Transient,
            AnalysisCmd::Dc(_) => AnalysisKind::Dc,
        }
    }

    /// Check numeric arguments. Source names are checked against a netlist
    /// by the engine.
    pub fn validate(&self) -> Result<()> {
        match self {
            AnalysisCmd::Transient { step, end } => {
                if !(step.is_finite() && *step > 0.0) {
                    return Err(CircuitError::InvalidParameter(format!(
                        "transient step must be > 0, got {}",
                        step
                    )));
                }
                if !(end.is_finite() && *end > 0.0) {
                    return Err(CircuitError::InvalidParameter(format!(
                        "transient end time must be > 0, got {}",
                        end
                    )));
                }
                if end / step > MAX_POINTS as f64 {
                    return Err(CircuitError::InvalidParameter(format!(
                        "transient would take more than {} steps",
                        MAX_POINTS
                    )));
                }
                Ok(())
            }
            AnalysisCmd::Dc(DcSweep::OperatingPoint) => Ok(()),
            AnalysisCmd::Dc(DcSweep::Source {
                source,
                start,
                stop,
                increment,
            }) => {
                if source.trim().is_empty() {
                    return Err(CircuitError::InvalidParameter(
                        "dc sweep source name is empty".to_string(),
                    ));
                }
                if !(start.is_finite() && stop.is_finite()) {
                    return Err(CircuitError::InvalidParameter(format!(
                        "dc sweep bounds must be finite, got {} .. {}",
                        start, stop
                    )));
                }
                if !increment.is_finite() || *increment == 0.0 {
                    return Err(CircuitError::InvalidParameter(format!(
                        "dc sweep increment must be nonzero, got {}",
                        increment
                    )));
                }
                let span = stop - start;
                if span != 0.0 && span.signum() != increment.signum() {
                    return Err(CircuitError::InvalidParameter(format!(
                        "dc sweep increment {} does not move from {} toward {}",
                        increment, start, stop
                    )));
                }
                if sweep_count(*start, *stop, *increment) > MAX_POINTS {
                    return Err(CircuitError::InvalidParameter(format!(
                        "dc sweep would take more than {} points",
                        MAX_POINTS
                    )));
                }
                Ok(())
            }
        }
    }

    /// Control line for a SPICE deck.
    pub fn spice_directive(&self) -> String {
        let f = format_spice_value;
        match self {
            AnalysisCmd::Transient { step, end } => format!(".tran {} {}", f(*step), f(*end)),
            AnalysisCmd::Dc(DcSweep::OperatingPoint) => ".op".to_string(),
            AnalysisCmd::Dc(DcSweep::Source {
                source,
                start,
                stop,
                increment,
            }) => format!(
                ".dc {} {} {} {}",
                source.to_ascii_lowercase(),
                f(*start),
                f(*stop),
                f(*increment)
            ),
        }
    }
}

impl fmt::Display for AnalysisCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spice_directive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_transient_arguments() {
        assert!(AnalysisCmd::transient(0.0, 1e-3).validate().is_err());
        assert!(AnalysisCmd::transient(1e-6, 0.0).validate().is_err());
        assert!(AnalysisCmd::transient(-1e-6, 1e-3).validate().is_err());
        assert!(AnalysisCmd::transient(f64::NAN, 1e-3).validate().is_err());
        assert!(AnalysisCmd::transient(1e-6, 1e-3).validate().is_ok());
    }

    #[test]
    fn sweep_increment_must_head_toward_stop() {
        let up = AnalysisCmd::Dc(DcSweep::source("V1", 0.0, 5.0, 1.0));
        let down = AnalysisCmd::Dc(DcSweep::source("V1", 5.0, 0.0, -1.0));
        let wrong = AnalysisCmd::Dc(DcSweep::source("V1", 0.0, 5.0, -1.0));
        let zero = AnalysisCmd::Dc(DcSweep::source("V1", 0.0, 5.0, 0.0));
        assert!(up.validate().is_ok());
        assert!(down.validate().is_ok());
        assert!(matches!(wrong.validate(), Err(CircuitError::InvalidParameter(_))));
        assert!(matches!(zero.validate(), Err(CircuitError::InvalidParameter(_))));
    }

    #[test]
    fn sweep_points_include_stop() {
        let sweep = DcSweep::source("V1", 0.0, 1.0, 0.25);
        assert_eq!(sweep.points(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let down = DcSweep::source("V1", 1.0, 0.0, -0.5);
        assert_eq!(down.points(), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn renders_directives() {
        assert_eq!(AnalysisCmd::transient(1e-6, 1e-3).spice_directive(), ".tran 1u 1m");
        assert_eq!(AnalysisCmd::operating_point().spice_directive(), ".op");
        assert_eq!(
            AnalysisCmd::Dc(DcSweep::source("V1", 0.0, 5.0, 0.5)).spice_directive(),
            ".dc v1 0 5 500m"
        );
    }
}
