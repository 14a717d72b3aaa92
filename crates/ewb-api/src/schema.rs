//! JSON circuit description
//!
//! ```json
//! {
//!   "title": "divider",
//!   "components": [
//!     { "name": "supply", "kind": "voltage_source", "params": { "voltage": 5 } },
//!     { "name": "load", "kind": "r", "params": { "resistance": "10" } }
//!   ],
//!   "wires": [["supply.+", "load.1"], ["load.2", "supply.-"]]
//! }
//! ```
//!
//! Terminals are written `<component name>.<role>`; a role is `1`, `2`, `+`,
//! `-` or `gnd`. Parameter values are numbers or SPICE tokens such as `4.7k`
//! and `10u`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ewb_core::{
    CircuitError, CircuitGraph, Component, ComponentId, ComponentKind, ParameterSet, Position, Result,
    TerminalId, Wire,
};
use ewb_devices::parse_spice_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn resolve(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Number(value) => Ok(*value),
            ParamValue::Text(text) => parse_spice_value(text).ok_or_else(|| {
                CircuitError::InvalidParameter(format!("{}: cannot parse value {:?}", name, text))
            }),
        }
    }
}

pub fn parameter_set(params: &BTreeMap<String, ParamValue>) -> Result<ParameterSet> {
    let mut set = ParameterSet::new();
    for (name, value) in params {
        set.set(name, value.resolve(name)?);
    }
    Ok(set)
}

pub fn parse_kind(kind: &str) -> Result<ComponentKind> {
    kind.parse().map_err(CircuitError::InvalidParameter)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircuitSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub wires: Vec<(String, String)>,
}

/// A graph built from a `CircuitSpec`, with the description's names.
#[derive(Debug, Clone)]
pub struct LoadedCircuit {
    pub graph: CircuitGraph,
    pub names: BTreeMap<String, ComponentId>,
}

impl CircuitSpec {
    pub fn from_json_str(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn build_circuit(&self) -> Result<LoadedCircuit> {
        let mut graph = CircuitGraph::new();
        let mut names = BTreeMap::new();
        for spec in &self.components {
            if names.contains_key(&spec.name) {
                return Err(CircuitError::InvalidParameter(format!(
                    "duplicate component name {}",
                    spec.name
                )));
            }
            let kind = parse_kind(&spec.kind)?;
            let id = graph.add_component(kind, parameter_set(&spec.params)?, spec.position);
            graph.set_label(id, Some(spec.name.clone()))?;
            names.insert(spec.name.clone(), id);
        }

        for (a, b) in &self.wires {
            let a = resolve_terminal(&graph, &names, a)?;
            let b = resolve_terminal(&graph, &names, b)?;
            graph.add_wire(a, b)?;
        }
        Ok(LoadedCircuit { graph, names })
    }
}

fn resolve_terminal(
    graph: &CircuitGraph,
    names: &BTreeMap<String, ComponentId>,
    reference: &str,
) -> Result<TerminalId> {
    let (name, role) = reference.rsplit_once('.').ok_or_else(|| {
        CircuitError::InvalidConnection(format!("terminal {:?} is not <name>.<role>", reference))
    })?;
    let id = *names
        .get(name)
        .ok_or_else(|| CircuitError::NotFound {
            what: "component",
            id: name.to_string(),
        })?;
    let component = graph.component(id).ok_or_else(|| CircuitError::NotFound {
        what: "component",
        id: name.to_string(),
    })?;
    component
        .kind
        .terminal_roles()
        .iter()
        .position(|r| r.as_str() == role)
        .and_then(|index| component.terminals.get(index).copied())
        .ok_or_else(|| CircuitError::NotFound {
            what: "terminal",
            id: reference.to_string(),
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub component_count: usize,
    pub wire_count: usize,
    pub node_count: usize,
    pub revision: u64,
}

impl Summary {
    pub fn of(graph: &CircuitGraph) -> Self {
        Self {
            component_count: graph.component_count(),
            wire_count: graph.wire_count(),
            node_count: graph.compute_nodes().len(),
            revision: graph.revision(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentView {
    #[serde(flatten)]
    pub component: Component,
    pub device: Option<String>,
}

impl From<&Component> for ComponentView {
    fn from(component: &Component) -> Self {
        Self {
            device: component
                .kind
                .device_kind()
                .map(|_| component.device_name()),
            component: component.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitView {
    pub id: usize,
    pub summary: Summary,
    pub components: Vec<ComponentView>,
    pub wires: Vec<Wire>,
}

impl CircuitView {
    pub fn of(id: usize, graph: &CircuitGraph) -> Self {
        Self {
            id,
            summary: Summary::of(graph),
            components: graph.components().map(ComponentView::from).collect(),
            wires: graph.wires().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIVIDER: &str = r#"{
        "components": [
            { "name": "supply", "kind": "v", "params": { "voltage": 5 } },
            { "name": "load", "kind": "resistor", "params": { "resistance": "10k" } }
        ],
        "wires": [["supply.+", "load.1"], ["load.2", "supply.-"]]
    }"#;

    #[test]
    fn builds_graph_from_description() {
        let loaded = CircuitSpec::from_json_str(DIVIDER).unwrap().build_circuit().unwrap();
        assert_eq!(loaded.graph.component_count(), 2);
        assert_eq!(loaded.graph.wire_count(), 2);
        let load = loaded.graph.component(loaded.names["load"]).unwrap();
        assert_eq!(load.parameters.get("resistance"), Some(10_000.0));
        assert_eq!(load.label.as_deref(), Some("load"));
    }

    #[test]
    fn rejects_unknown_terminals_and_kinds() {
        let mut spec = CircuitSpec::from_json_str(DIVIDER).unwrap();
        spec.wires.push(("load.+".to_string(), "supply.1".to_string()));
        assert!(matches!(spec.build_circuit(), Err(CircuitError::NotFound { .. })));

        let mut spec = CircuitSpec::from_json_str(DIVIDER).unwrap();
        spec.components[0].kind = "transistor".to_string();
        assert!(matches!(spec.build_circuit(), Err(CircuitError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_unparsable_values() {
        let value = ParamValue::Text("lots".to_string());
        assert!(value.resolve("resistance").is_err());
    }
}
