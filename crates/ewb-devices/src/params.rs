//! Component parameter sets and their per-kind schema

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::kind::ComponentKind;
use crate::units::Unit;

/// Range a parameter value must satisfy at netlist build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Any,
    Positive,
    NonNegative,
}

impl Constraint {
    pub fn accepts(&self, value: f64) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Positive => value > 0.0,
            Constraint::NonNegative => value >= 0.0,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Constraint::Any => "any value",
            Constraint::Positive => "> 0",
            Constraint::NonNegative => ">= 0",
        }
    }
}

/// Schema entry for one named parameter of a component kind.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub unit: Unit,
    pub default: f64,
    pub constraint: Constraint,
}

impl ParamSpec {
    pub const fn new(name: &'static str, unit: Unit, default: f64, constraint: Constraint) -> Self {
        Self {
            name,
            unit,
            default,
            constraint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{kind:?} has no parameter named '{name}'")]
    Unknown { kind: ComponentKind, name: String },
    #[error("parameter '{name}' is missing")]
    Missing { name: String },
    #[error("parameter '{name}' is not a finite number: {value}")]
    NonFinite { name: String, value: f64 },
    #[error("parameter '{name}' = {value} {unit} must be {constraint}")]
    OutOfRange {
        name: String,
        value: f64,
        unit: &'static str,
        constraint: &'static str,
    },
}

impl ParameterError {
    pub(crate) fn out_of_range(spec: &ParamSpec, value: f64) -> Self {
        ParameterError::OutOfRange {
            name: spec.name.to_string(),
            value,
            unit: spec.unit.symbol(),
            constraint: spec.constraint.describe(),
        }
    }
}

/// Name → value mapping in SI base units.
///
/// Ordered so that iteration, display and netlist fingerprints are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) -> Option<f64> {
        self.values.insert(name.to_string(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill every schema parameter that is not already present.
    pub fn merge_defaults(&mut self, specs: &[ParamSpec]) {
        for spec in specs {
            self.values
                .entry(spec.name.to_string())
                .or_insert(spec.default);
        }
    }

    pub(crate) fn require(&self, spec: &ParamSpec) -> Result<f64, ParameterError> {
        let value = self.get(spec.name).ok_or_else(|| ParameterError::Missing {
            name: spec.name.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ParameterError::NonFinite {
                name: spec.name.to_string(),
                value,
            });
        }
        if !spec.constraint.accepts(value) {
            return Err(ParameterError::out_of_range(spec, value));
        }
        Ok(value)
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_defaults_keeps_explicit_values() {
        let specs = ComponentKind::Resistor.parameter_specs();
        let mut params = ParameterSet::new().with("resistance", 10.0);
        params.merge_defaults(specs);
        assert_eq!(params.get("resistance"), Some(10.0));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let params = ParameterSet::new().with("voltage", 5.0);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"voltage":5.0}"#);
    }
}
