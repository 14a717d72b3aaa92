//! Netlist construction
//!
//! `NetlistBuilder` is a pure function of a `CircuitSnapshot`: resolve ground,
//! number the remaining nodes, and ask each component kind for its device
//! record. The resulting `Netlist` is immutable and fingerprinted so callers
//! can tell whether an earlier result still describes the same circuit.

use ewb_devices::{DeviceKind, DeviceRecord, DeviceValue, NodeRef, SourceWaveform};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::analysis::AnalysisCmd;
use crate::error::{CircuitError, Result};
use crate::graph::{CircuitSnapshot, ComponentId, TerminalId};
use crate::topology::NodeId;
use crate::validate::{GroundResolution, ValidationWarning};

/// SHA-256 over the device records and the ground node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..12].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Netlist {
    title: String,
    devices: Vec<DeviceRecord>,
    /// Indexed by `NodeRef`; entry 0 is always `"0"`.
    node_names: Vec<String>,
    ground: GroundResolution,
    node_refs: BTreeMap<NodeId, NodeRef>,
    terminal_nodes: BTreeMap<TerminalId, NodeRef>,
    device_components: BTreeMap<String, ComponentId>,
    warnings: Vec<ValidationWarning>,
    fingerprint: Fingerprint,
    revision: u64,
}

impl Netlist {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }

    /// Node count including ground.
    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    pub fn ground(&self) -> GroundResolution {
        self.ground
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Graph revision the netlist was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_name(&self, node: NodeRef) -> Option<&str> {
        self.node_names.get(node.0).map(String::as_str)
    }

    pub fn node_ref(&self, node: NodeId) -> Option<NodeRef> {
        self.node_refs.get(&node).copied()
    }

    pub fn terminal_node(&self, terminal: TerminalId) -> Option<NodeRef> {
        self.terminal_nodes.get(&terminal).copied()
    }

    /// Case-insensitive device lookup.
    pub fn device(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices
            .iter()
            .find(|device| device.name.eq_ignore_ascii_case(name))
    }

    pub fn component_of(&self, device: &str) -> Option<ComponentId> {
        self.device(device)
            .and_then(|record| self.device_components.get(&record.name))
            .copied()
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.device(name).map_or(false, |device| device.kind.is_source())
    }

    /// Render a complete SPICE deck for `analysis`.
    pub fn to_spice(&self, analysis: &AnalysisCmd) -> String {
        let mut deck = String::new();
        deck.push_str(&format!("* {}\n", self.title));
        for device in &self.devices {
            deck.push_str(&device.spice_line(&self.node_names));
            deck.push('\n');
        }
        let probes: Vec<String> = self
            .devices
            .iter()
            .filter_map(|device| {
                let name = device.name.to_ascii_lowercase();
                match device.kind {
                    DeviceKind::Resistor | DeviceKind::Capacitor => Some(format!("@{}[i]", name)),
                    DeviceKind::CurrentSource => Some(format!("@{}[current]", name)),
                    _ => None,
                }
            })
            .collect();
        if probes.is_empty() {
            deck.push_str(".save all\n");
        } else {
            deck.push_str(&format!(".save all {}\n", probes.join(" ")));
        }
        deck.push_str(&analysis.spice_directive());
        deck.push('\n');
        deck.push_str(".end\n");
        deck
    }
}

#[derive(Debug, Clone)]
pub struct NetlistBuilder {
    title: String,
}

impl Default for NetlistBuilder {
    fn default() -> Self {
        Self {
            title: "ewb circuit".to_string(),
        }
    }
}

impl NetlistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn build(&self, snapshot: &CircuitSnapshot) -> Result<Netlist> {
        let report = snapshot.validate()?;
        let ground = match report.ground {
            GroundResolution::Unresolved => return Err(CircuitError::EmptyCircuit),
            resolved => resolved,
        };
        let ground_node = ground.node().ok_or(CircuitError::EmptyCircuit)?;

        let mut node_names = vec!["0".to_string()];
        let mut node_refs = BTreeMap::new();
        for node in snapshot.partition.nodes() {
            if node.id == ground_node {
                node_refs.insert(node.id, NodeRef::GROUND);
            } else {
                node_refs.insert(node.id, NodeRef(node_names.len()));
                node_names.push(format!("n{}", node_names.len()));
            }
        }

        let mut terminal_nodes = BTreeMap::new();
        let mut devices = Vec::new();
        let mut device_components = BTreeMap::new();
        for component in &snapshot.components {
            let mut nodes = Vec::with_capacity(component.terminals.len());
            for terminal in &component.terminals {
                let node_ref = snapshot
                    .partition
                    .node_of(*terminal)
                    .and_then(|node| node_refs.get(&node).copied())
                    .ok_or_else(|| CircuitError::not_found("terminal", terminal))?;
                terminal_nodes.insert(*terminal, node_ref);
                nodes.push(node_ref);
            }

            let name = component.device_name();
            let record = component
                .kind
                .emit_device_record(name.clone(), nodes, &component.parameters)
                .map_err(|err| {
                    CircuitError::InvalidParameter(format!("{} ({}): {}", name, component.id, err))
                })?;
            if let Some(record) = record {
                device_components.insert(record.name.clone(), component.id);
                devices.push(record);
            }
        }

        let fingerprint = fingerprint(&devices, ground_node);
        info!(
            devices = devices.len(),
            nodes = node_names.len(),
            fingerprint = %fingerprint.short(),
            "netlist built"
        );

        let netlist = Netlist {
            title: self.title.clone(),
            devices,
            node_names,
            ground,
            node_refs,
            terminal_nodes,
            device_components,
            warnings: report.warnings,
            fingerprint,
            revision: snapshot.revision,
        };
        debug!(deck = %netlist.to_spice(&AnalysisCmd::operating_point()), "netlist deck");
        Ok(netlist)
    }
}

fn fingerprint(devices: &[DeviceRecord], ground: NodeId) -> Fingerprint {
    let mut hasher = Sha256::new();
    for device in devices {
        hasher.update(device.name.as_bytes());
        hasher.update([0u8, device.kind.letter() as u8]);
        hasher.update((device.nodes.len() as u64).to_le_bytes());
        for node in &device.nodes {
            hasher.update((node.0 as u64).to_le_bytes());
        }
        for value in device_values(&device.value) {
            hasher.update(value.to_bits().to_le_bytes());
        }
    }
    hasher.update((ground.0 as u64).to_le_bytes());
    Fingerprint(hasher.finalize().into())
}

fn device_values(value: &DeviceValue) -> Vec<f64> {
    match value {
        DeviceValue::Passive(value) => vec![*value],
        DeviceValue::Source(SourceWaveform::Dc { value }) => vec![0.0, *value],
        DeviceValue::Source(SourceWaveform::Sine {
            offset,
            amplitude,
            frequency,
            ac_magnitude,
            ac_phase,
        }) => vec![1.0, *offset, *amplitude, *frequency, *ac_magnitude, *ac_phase],
        DeviceValue::Source(SourceWaveform::Pulse {
            initial,
            pulsed,
            delay,
            rise,
            fall,
            width,
            period,
        }) => vec![2.0, *initial, *pulsed, *delay, *rise, *fall, *width, *period],
    }
}
