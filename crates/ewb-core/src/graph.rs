//! Editable circuit graph
//!
//! `CircuitGraph` owns components, their terminals and the wires between
//! terminals. All edits are synchronous. Simulation never reads the live graph;
//! it works from a `CircuitSnapshot` taken at submission time.

use ewb_devices::{ComponentKind, ParameterSet, TerminalRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CircuitError, Result};
use crate::topology::NodePartition;
use crate::validate::{self, ValidationReport};

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(ComponentId, "C#");
id_type!(TerminalId, "T#");
id_type!(WireId, "W#");

/// Placement on the drawing surface. Opaque to the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: TerminalId,
    pub component: ComponentId,
    pub role: TerminalRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    pub parameters: ParameterSet,
    pub position: Position,
    pub label: Option<String>,
    /// Declaration order, fixed by `kind`.
    pub terminals: Vec<TerminalId>,
}

impl Component {
    pub fn terminal(&self, role: TerminalRole) -> Option<TerminalId> {
        self.kind
            .terminal_roles()
            .iter()
            .position(|r| *r == role)
            .and_then(|index| self.terminals.get(index).copied())
    }

    /// Device name used in netlists, e.g. `R3`.
    pub fn device_name(&self) -> String {
        match self.kind.device_kind() {
            Some(kind) => format!("{}{}", kind.letter(), self.id.0),
            None => format!("GND{}", self.id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    pub a: TerminalId,
    pub b: TerminalId,
}

impl Wire {
    pub fn touches(&self, terminal: TerminalId) -> bool {
        self.a == terminal || self.b == terminal
    }

    fn joins(&self, a: TerminalId, b: TerminalId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CircuitGraph {
    components: BTreeMap<ComponentId, Component>,
    terminals: BTreeMap<TerminalId, Terminal>,
    wires: BTreeMap<WireId, Wire>,
    next_component: usize,
    next_terminal: usize,
    next_wire: usize,
    revision: u64,
}

impl CircuitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a component. Missing parameters take the kind's defaults; values
    /// are checked when a netlist is built.
    pub fn add_component(
        &mut self,
        kind: ComponentKind,
        mut parameters: ParameterSet,
        position: Position,
    ) -> ComponentId {
        self.next_component += 1;
        let id = ComponentId(self.next_component);
        parameters.merge_defaults(kind.parameter_specs());

        let mut terminals = Vec::with_capacity(kind.terminal_count());
        for role in kind.terminal_roles() {
            self.next_terminal += 1;
            let terminal = TerminalId(self.next_terminal);
            self.terminals.insert(
                terminal,
                Terminal {
                    id: terminal,
                    component: id,
                    role: *role,
                },
            );
            terminals.push(terminal);
        }

        self.components.insert(
            id,
            Component {
                id,
                kind,
                parameters,
                position,
                label: None,
                terminals,
            },
        );
        self.touch();
        debug!(component = %id, %kind, "component added");
        id
    }

    /// Remove a component together with every wire touching its terminals.
    ///
    /// Returns the removed wire ids in ascending order.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Vec<WireId>> {
        let component = self
            .components
            .remove(&id)
            .ok_or_else(|| CircuitError::not_found("component", id))?;

        let removed: Vec<WireId> = self
            .wires
            .values()
            .filter(|wire| component.terminals.iter().any(|t| wire.touches(*t)))
            .map(|wire| wire.id)
            .collect();
        for wire in &removed {
            self.wires.remove(wire);
        }
        for terminal in &component.terminals {
            self.terminals.remove(terminal);
        }
        self.touch();
        debug!(component = %id, wires = removed.len(), "component removed");
        Ok(removed)
    }

    pub fn add_wire(&mut self, a: TerminalId, b: TerminalId) -> Result<WireId> {
        for terminal in [a, b] {
            if !self.terminals.contains_key(&terminal) {
                return Err(CircuitError::InvalidConnection(format!(
                    "unknown terminal {}",
                    terminal
                )));
            }
        }
        if a == b {
            return Err(CircuitError::InvalidConnection(format!(
                "cannot wire terminal {} to itself",
                a
            )));
        }
        if let Some(existing) = self.wires.values().find(|wire| wire.joins(a, b)) {
            return Err(CircuitError::InvalidConnection(format!(
                "{} and {} are already wired by {}",
                a, b, existing.id
            )));
        }

        self.next_wire += 1;
        let id = WireId(self.next_wire);
        self.wires.insert(id, Wire { id, a, b });
        self.touch();
        Ok(id)
    }

    pub fn remove_wire(&mut self, id: WireId) -> Result<Wire> {
        let wire = self
            .wires
            .remove(&id)
            .ok_or_else(|| CircuitError::not_found("wire", id))?;
        self.touch();
        Ok(wire)
    }

    /// Replace one parameter value, returning the previous one.
    ///
    /// The value is range-checked at netlist build time, so an out-of-range
    /// edit can be corrected before simulating.
    pub fn set_parameter(&mut self, id: ComponentId, name: &str, value: f64) -> Result<Option<f64>> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or_else(|| CircuitError::not_found("component", id))?;
        let previous = component.parameters.set(name, value);
        self.touch();
        Ok(previous)
    }

    pub fn move_component(&mut self, id: ComponentId, position: Position) -> Result<()> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or_else(|| CircuitError::not_found("component", id))?;
        component.position = position;
        Ok(())
    }

    pub fn set_label(&mut self, id: ComponentId, label: Option<String>) -> Result<()> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or_else(|| CircuitError::not_found("component", id))?;
        component.label = label;
        Ok(())
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn terminal(&self, id: TerminalId) -> Option<&Terminal> {
        self.terminals.get(&id)
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    /// Terminal of `component` at declaration index `index`.
    pub fn terminal_at(&self, component: ComponentId, index: usize) -> Result<TerminalId> {
        let found = self
            .components
            .get(&component)
            .ok_or_else(|| CircuitError::not_found("component", component))?;
        found
            .terminals
            .get(index)
            .copied()
            .ok_or_else(|| CircuitError::not_found("terminal", format!("{}[{}]", component, index)))
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals.values()
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    pub fn wires_at(&self, terminal: TerminalId) -> Vec<WireId> {
        self.wires
            .values()
            .filter(|wire| wire.touches(terminal))
            .map(|wire| wire.id)
            .collect()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Bumped on every structural or parameter edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn compute_nodes(&self) -> NodePartition {
        NodePartition::compute(
            self.terminals.keys().copied(),
            self.wires.values().map(|wire| (wire.a, wire.b)),
        )
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        let partition = self.compute_nodes();
        validate::validate(self.components.values(), &partition)
    }

    /// Immutable copy of the graph and its node partition.
    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            revision: self.revision,
            components: self.components.values().cloned().collect(),
            wires: self.wires.values().copied().collect(),
            partition: self.compute_nodes(),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Frozen view of a graph used for netlist builds and simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub revision: u64,
    /// Ascending component id.
    pub components: Vec<Component>,
    pub wires: Vec<Wire>,
    pub partition: NodePartition,
}

impl CircuitSnapshot {
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components
            .binary_search_by_key(&id, |component| component.id)
            .ok()
            .map(|index| &self.components[index])
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        validate::validate(self.components.iter(), &self.partition)
    }

    pub fn into_shared(self) -> Arc<CircuitSnapshot> {
        Arc::new(self)
    }
}
