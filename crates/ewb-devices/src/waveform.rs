//! Independent source waveforms
//!
//! A source is either a constant (`DC`), a damped-free sine (`SIN`) or a
//! trapezoidal pulse train (`PULSE`). The same description drives the SPICE
//! deck text and the time-domain evaluation used by the built-in solver.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::units::format_spice_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SourceWaveform {
    Dc {
        value: f64,
    },
    Sine {
        offset: f64,
        amplitude: f64,
        /// Hz
        frequency: f64,
        /// Small-signal magnitude, only used by AC-capable solvers.
        ac_magnitude: f64,
        /// Degrees.
        ac_phase: f64,
    },
    Pulse {
        initial: f64,
        pulsed: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        width: f64,
        period: f64,
    },
}

impl SourceWaveform {
    /// Value used for the DC operating point and DC sweeps.
    pub fn dc_value(&self) -> f64 {
        match self {
            SourceWaveform::Dc { value } => *value,
            SourceWaveform::Sine { offset, .. } => *offset,
            SourceWaveform::Pulse { initial, .. } => *initial,
        }
    }

    /// Instantaneous value at time `t` (seconds).
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            SourceWaveform::Dc { value } => *value,
            SourceWaveform::Sine {
                offset,
                amplitude,
                frequency,
                ..
            } => offset + amplitude * (2.0 * PI * frequency * t).sin(),
            SourceWaveform::Pulse {
                initial,
                pulsed,
                delay,
                rise,
                fall,
                width,
                period,
            } => {
                if t < *delay {
                    return *initial;
                }
                let local = if *period > 0.0 {
                    (t - delay) % period
                } else {
                    t - delay
                };
                if local < *rise {
                    initial + (pulsed - initial) * local / rise
                } else if local < rise + width {
                    *pulsed
                } else if local < rise + width + fall {
                    pulsed + (initial - pulsed) * (local - rise - width) / fall
                } else {
                    *initial
                }
            }
        }
    }

    /// Source specification as it appears after the node list of a `V`/`I` line.
    pub fn spice_spec(&self) -> String {
        let f = format_spice_value;
        match self {
            SourceWaveform::Dc { value } => format!("DC {}", f(*value)),
            SourceWaveform::Sine {
                offset,
                amplitude,
                frequency,
                ac_magnitude,
                ac_phase,
            } => format!(
                "DC {} SIN({} {} {}) AC {} {}",
                f(*offset),
                f(*offset),
                f(*amplitude),
                f(*frequency),
                f(*ac_magnitude),
                f(*ac_phase)
            ),
            SourceWaveform::Pulse {
                initial,
                pulsed,
                delay,
                rise,
                fall,
                width,
                period,
            } => format!(
                "DC {} PULSE({} {} {} {} {} {} {})",
                f(*initial),
                f(*initial),
                f(*pulsed),
                f(*delay),
                f(*rise),
                f(*fall),
                f(*width),
                f(*period)
            ),
        }
    }

    /// Copy of this waveform with its DC level replaced, used by DC sweeps.
    pub fn with_dc_value(&self, value: f64) -> SourceWaveform {
        match self {
            SourceWaveform::Dc { .. } => SourceWaveform::Dc { value },
            SourceWaveform::Sine {
                amplitude,
                frequency,
                ac_magnitude,
                ac_phase,
                ..
            } => SourceWaveform::Sine {
                offset: value,
                amplitude: *amplitude,
                frequency: *frequency,
                ac_magnitude: *ac_magnitude,
                ac_phase: *ac_phase,
            },
            SourceWaveform::Pulse {
                pulsed,
                delay,
                rise,
                fall,
                width,
                period,
                ..
            } => SourceWaveform::Pulse {
                initial: value,
                pulsed: *pulsed,
                delay: *delay,
                rise: *rise,
                fall: *fall,
                width: *width,
                period: *period,
            },
        }
    }
}
