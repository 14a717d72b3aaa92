//! Solver-facing device records
//!
//! One record per emitted component: a SPICE element letter, a unique name,
//! node references in the element's pin order and the element value.

use serde::{Deserialize, Serialize};

use crate::units::format_spice_value;
use crate::waveform::SourceWaveform;

/// Netlist node index; `NodeRef(0)` is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(pub usize);

impl NodeRef {
    pub const GROUND: NodeRef = NodeRef(0);

    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
}

impl DeviceKind {
    pub fn letter(&self) -> char {
        match self {
            DeviceKind::Resistor => 'R',
            DeviceKind::Capacitor => 'C',
            DeviceKind::Inductor => 'L',
            DeviceKind::VoltageSource => 'V',
            DeviceKind::CurrentSource => 'I',
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, DeviceKind::VoltageSource | DeviceKind::CurrentSource)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceValue {
    /// Ω, F or H depending on the element.
    Passive(f64),
    Source(SourceWaveform),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub kind: DeviceKind,
    pub nodes: Vec<NodeRef>,
    pub value: DeviceValue,
}

impl DeviceRecord {
    /// Render the element line, e.g. `R3 n1 0 10k` or `V1 n1 0 DC 5`.
    ///
    /// `node_names` is indexed by `NodeRef`.
    pub fn spice_line(&self, node_names: &[String]) -> String {
        let mut line = self.name.clone();
        for node in &self.nodes {
            line.push(' ');
            match node_names.get(node.0) {
                Some(name) => line.push_str(name),
                None => line.push_str(&format!("n{}", node.0)),
            }
        }
        line.push(' ');
        match &self.value {
            DeviceValue::Passive(value) => line.push_str(&format_spice_value(*value)),
            DeviceValue::Source(waveform) => line.push_str(&waveform.spice_spec()),
        }
        line
    }

    pub fn passive_value(&self) -> Option<f64> {
        match self.value {
            DeviceValue::Passive(value) => Some(value),
            DeviceValue::Source(_) => None,
        }
    }

    pub fn waveform(&self) -> Option<&SourceWaveform> {
        match &self.value {
            DeviceValue::Source(waveform) => Some(waveform),
            DeviceValue::Passive(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resistor_line_uses_node_names() {
        let names = vec!["0".to_string(), "n1".to_string()];
        let record = DeviceRecord {
            name: "R2".to_string(),
            kind: DeviceKind::Resistor,
            nodes: vec![NodeRef(1), NodeRef::GROUND],
            value: DeviceValue::Passive(4.7e3),
        };
        assert_eq!(record.spice_line(&names), "R2 n1 0 4.7k");
    }

    #[test]
    fn source_line_carries_waveform() {
        let names = vec!["0".to_string(), "n1".to_string()];
        let record = DeviceRecord {
            name: "V1".to_string(),
            kind: DeviceKind::VoltageSource,
            nodes: vec![NodeRef(1), NodeRef::GROUND],
            value: DeviceValue::Source(SourceWaveform::Dc { value: 5.0 }),
        };
        assert_eq!(record.spice_line(&names), "V1 n1 0 DC 5");
    }
}
