//! Component kinds and their capability set
//!
//! Every kind is a closed enum variant answering the same three questions:
//! how many terminals it has, whether a parameter set is acceptable, and which
//! device record it contributes to a netlist. Adding a kind means extending the
//! matches below, which the compiler checks exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::params::{Constraint, ParamSpec, ParameterError, ParameterSet};
use crate::record::{DeviceKind, DeviceRecord, DeviceValue, NodeRef};
use crate::units::Unit;
use crate::waveform::SourceWaveform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    SineVoltageSource,
    PulseVoltageSource,
    CurrentSource,
    Ground,
}

/// Role of a terminal within its component, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalRole {
    /// First pin of a two-terminal passive.
    Pin1,
    /// Second pin of a two-terminal passive.
    Pin2,
    Positive,
    Negative,
    Ground,
}

impl TerminalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalRole::Pin1 => "1",
            TerminalRole::Pin2 => "2",
            TerminalRole::Positive => "+",
            TerminalRole::Negative => "-",
            TerminalRole::Ground => "gnd",
        }
    }
}

impl fmt::Display for TerminalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PASSIVE_PINS: [TerminalRole; 2] = [TerminalRole::Pin1, TerminalRole::Pin2];
const SOURCE_PINS: [TerminalRole; 2] = [TerminalRole::Positive, TerminalRole::Negative];
const GROUND_PINS: [TerminalRole; 1] = [TerminalRole::Ground];

const RESISTOR_PARAMS: [ParamSpec; 1] =
    [ParamSpec::new("resistance", Unit::Ohm, 1e3, Constraint::Positive)];
const CAPACITOR_PARAMS: [ParamSpec; 1] =
    [ParamSpec::new("capacitance", Unit::Farad, 1e-6, Constraint::Positive)];
const INDUCTOR_PARAMS: [ParamSpec; 1] =
    [ParamSpec::new("inductance", Unit::Henry, 1e-3, Constraint::Positive)];
const VOLTAGE_PARAMS: [ParamSpec; 1] =
    [ParamSpec::new("voltage", Unit::Volt, 5.0, Constraint::Any)];
const SINE_PARAMS: [ParamSpec; 5] = [
    ParamSpec::new("offset", Unit::Volt, 0.0, Constraint::Any),
    ParamSpec::new("amplitude", Unit::Volt, 5.0, Constraint::Any),
    ParamSpec::new("frequency", Unit::Hertz, 1e3, Constraint::Positive),
    ParamSpec::new("ac_magnitude", Unit::Volt, 1.0, Constraint::Any),
    ParamSpec::new("ac_phase", Unit::Degree, 0.0, Constraint::Any),
];
const PULSE_PARAMS: [ParamSpec; 7] = [
    ParamSpec::new("initial", Unit::Volt, 0.0, Constraint::Any),
    ParamSpec::new("pulsed", Unit::Volt, 5.0, Constraint::Any),
    ParamSpec::new("delay", Unit::Second, 0.0, Constraint::NonNegative),
    ParamSpec::new("rise", Unit::Second, 1e-9, Constraint::NonNegative),
    ParamSpec::new("fall", Unit::Second, 1e-9, Constraint::NonNegative),
    ParamSpec::new("width", Unit::Second, 1e-3, Constraint::NonNegative),
    ParamSpec::new("period", Unit::Second, 2e-3, Constraint::Positive),
];
const CURRENT_PARAMS: [ParamSpec; 1] =
    [ParamSpec::new("current", Unit::Ampere, 1e-3, Constraint::Any)];

impl ComponentKind {
    pub const ALL: [ComponentKind; 8] = [
        ComponentKind::Resistor,
        ComponentKind::Capacitor,
        ComponentKind::Inductor,
        ComponentKind::VoltageSource,
        ComponentKind::SineVoltageSource,
        ComponentKind::PulseVoltageSource,
        ComponentKind::CurrentSource,
        ComponentKind::Ground,
    ];

    pub fn terminal_roles(&self) -> &'static [TerminalRole] {
        match self {
            ComponentKind::Resistor | ComponentKind::Capacitor | ComponentKind::Inductor => {
                &PASSIVE_PINS
            }
            ComponentKind::VoltageSource
            | ComponentKind::SineVoltageSource
            | ComponentKind::PulseVoltageSource
            | ComponentKind::CurrentSource => &SOURCE_PINS,
            ComponentKind::Ground => &GROUND_PINS,
        }
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_roles().len()
    }

    pub fn parameter_specs(&self) -> &'static [ParamSpec] {
        match self {
            ComponentKind::Resistor => &RESISTOR_PARAMS,
            ComponentKind::Capacitor => &CAPACITOR_PARAMS,
            ComponentKind::Inductor => &INDUCTOR_PARAMS,
            ComponentKind::VoltageSource => &VOLTAGE_PARAMS,
            ComponentKind::SineVoltageSource => &SINE_PARAMS,
            ComponentKind::PulseVoltageSource => &PULSE_PARAMS,
            ComponentKind::CurrentSource => &CURRENT_PARAMS,
            ComponentKind::Ground => &[],
        }
    }

    pub fn parameter_spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.parameter_specs().iter().find(|spec| spec.name == name)
    }

    pub fn default_parameters(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.merge_defaults(self.parameter_specs());
        params
    }

    /// The element family this kind emits, `None` for kinds that only shape
    /// topology.
    pub fn device_kind(&self) -> Option<DeviceKind> {
        match self {
            ComponentKind::Resistor => Some(DeviceKind::Resistor),
            ComponentKind::Capacitor => Some(DeviceKind::Capacitor),
            ComponentKind::Inductor => Some(DeviceKind::Inductor),
            ComponentKind::VoltageSource
            | ComponentKind::SineVoltageSource
            | ComponentKind::PulseVoltageSource => Some(DeviceKind::VoltageSource),
            ComponentKind::CurrentSource => Some(DeviceKind::CurrentSource),
            ComponentKind::Ground => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, ComponentKind::Ground)
    }

    pub fn is_independent_source(&self) -> bool {
        self.device_kind().map_or(false, |kind| kind.is_source())
    }

    /// Check that every parameter is known, present and within range.
    pub fn validate_parameters(&self, params: &ParameterSet) -> Result<(), ParameterError> {
        for (name, _) in params.iter() {
            if self.parameter_spec(name).is_none() {
                return Err(ParameterError::Unknown {
                    kind: *self,
                    name: name.to_string(),
                });
            }
        }
        for spec in self.parameter_specs() {
            params.require(spec)?;
        }
        Ok(())
    }

    /// Build the device record for one component instance.
    ///
    /// `nodes` must be in terminal declaration order. Returns `Ok(None)` for
    /// kinds that contribute no element (ground).
    pub fn emit_device_record(
        &self,
        name: String,
        nodes: Vec<NodeRef>,
        params: &ParameterSet,
    ) -> Result<Option<DeviceRecord>, ParameterError> {
        self.validate_parameters(params)?;
        let Some(kind) = self.device_kind() else {
            return Ok(None);
        };
        let get = |name: &str| -> Result<f64, ParameterError> {
            let spec = self
                .parameter_spec(name)
                .ok_or_else(|| ParameterError::Missing {
                    name: name.to_string(),
                })?;
            params.require(spec)
        };

        let value = match self {
            ComponentKind::Resistor => DeviceValue::Passive(get("resistance")?),
            ComponentKind::Capacitor => DeviceValue::Passive(get("capacitance")?),
            ComponentKind::Inductor => DeviceValue::Passive(get("inductance")?),
            ComponentKind::VoltageSource => DeviceValue::Source(SourceWaveform::Dc {
                value: get("voltage")?,
            }),
            ComponentKind::SineVoltageSource => DeviceValue::Source(SourceWaveform::Sine {
                offset: get("offset")?,
                amplitude: get("amplitude")?,
                frequency: get("frequency")?,
                ac_magnitude: get("ac_magnitude")?,
                ac_phase: get("ac_phase")?,
            }),
            ComponentKind::PulseVoltageSource => DeviceValue::Source(SourceWaveform::Pulse {
                initial: get("initial")?,
                pulsed: get("pulsed")?,
                delay: get("delay")?,
                rise: get("rise")?,
                fall: get("fall")?,
                width: get("width")?,
                period: get("period")?,
            }),
            ComponentKind::CurrentSource => DeviceValue::Source(SourceWaveform::Dc {
                value: get("current")?,
            }),
            ComponentKind::Ground => return Ok(None),
        };

        Ok(Some(DeviceRecord {
            name,
            kind,
            nodes,
            value,
        }))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "resistor",
            ComponentKind::Capacitor => "capacitor",
            ComponentKind::Inductor => "inductor",
            ComponentKind::VoltageSource => "voltage_source",
            ComponentKind::SineVoltageSource => "sine_voltage_source",
            ComponentKind::PulseVoltageSource => "pulse_voltage_source",
            ComponentKind::CurrentSource => "current_source",
            ComponentKind::Ground => "ground",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ComponentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == lower)
            .or(match lower.as_str() {
                "r" => Some(ComponentKind::Resistor),
                "c" => Some(ComponentKind::Capacitor),
                "l" => Some(ComponentKind::Inductor),
                "v" | "vdc" => Some(ComponentKind::VoltageSource),
                "vsin" | "vac" => Some(ComponentKind::SineVoltageSource),
                "vpulse" => Some(ComponentKind::PulseVoltageSource),
                "i" | "idc" => Some(ComponentKind::CurrentSource),
                "gnd" => Some(ComponentKind::Ground),
                _ => None,
            })
            .ok_or_else(|| format!("unknown component kind: {}", s))
    }
}
