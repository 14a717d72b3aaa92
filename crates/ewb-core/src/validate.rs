//! Topology checks and ground resolution

use ewb_devices::TerminalRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

use crate::error::{CircuitError, Result};
use crate::graph::{Component, ComponentId, TerminalId};
use crate::topology::{NodeId, NodePartition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "node", rename_all = "snake_case")]
pub enum GroundResolution {
    /// Node holding the Ground component terminal(s).
    Explicit(NodeId),
    /// No Ground component; a node was designated.
    Default(NodeId),
    /// At most one node exists, so there is nothing to reference against.
    Unresolved,
}

impl GroundResolution {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            GroundResolution::Explicit(node) | GroundResolution::Default(node) => Some(*node),
            GroundResolution::Unresolved => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    DefaultGround {
        node: NodeId,
    },
    EmptyCircuit,
    FloatingTerminal {
        component: ComponentId,
        terminal: TerminalId,
        role: TerminalRole,
    },
    ShortedComponent {
        component: ComponentId,
        node: NodeId,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::DefaultGround { node } => {
                write!(f, "no ground component, {} used as ground", node)
            }
            ValidationWarning::EmptyCircuit => {
                f.write_str("circuit has fewer than two electrical nodes")
            }
            ValidationWarning::FloatingTerminal {
                component,
                terminal,
                role,
            } => write!(
                f,
                "terminal {} ({}) of {} is not connected",
                terminal, role, component
            ),
            ValidationWarning::ShortedComponent { component, node } => {
                write!(f, "all terminals of {} sit on {}", component, node)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ground: GroundResolution,
    pub node_count: usize,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Decide which node is ground.
///
/// Ground components on more than one node is a hard error. Without a ground
/// component the default is the lowest node holding an independent source's
/// negative terminal, falling back to the lowest node overall.
pub fn resolve_ground<'a, I>(components: I, partition: &NodePartition) -> Result<GroundResolution>
where
    I: IntoIterator<Item = &'a Component>,
{
    let mut ground_nodes = BTreeSet::new();
    let mut source_returns = BTreeSet::new();
    for component in components {
        if component.kind.is_ground() {
            ground_nodes.extend(component.terminals.iter().filter_map(|t| partition.node_of(*t)));
        } else if component.kind.is_independent_source() {
            if let Some(node) = component
                .terminal(TerminalRole::Negative)
                .and_then(|t| partition.node_of(t))
            {
                source_returns.insert(node);
            }
        }
    }

    if ground_nodes.len() > 1 {
        return Err(CircuitError::ConflictingGround {
            nodes: ground_nodes.into_iter().map(|node| node.0).collect(),
        });
    }
    if partition.len() <= 1 {
        return Ok(GroundResolution::Unresolved);
    }
    if let Some(node) = ground_nodes.into_iter().next() {
        return Ok(GroundResolution::Explicit(node));
    }
    let node = source_returns.into_iter().next().unwrap_or(NodeId(0));
    Ok(GroundResolution::Default(node))
}

pub(crate) fn validate<'a, I>(components: I, partition: &NodePartition) -> Result<ValidationReport>
where
    I: IntoIterator<Item = &'a Component>,
    I::IntoIter: Clone,
{
    let components = components.into_iter();
    let ground = resolve_ground(components.clone(), partition)?;

    let mut warnings = Vec::new();
    match ground {
        GroundResolution::Default(node) => warnings.push(ValidationWarning::DefaultGround { node }),
        GroundResolution::Unresolved => warnings.push(ValidationWarning::EmptyCircuit),
        GroundResolution::Explicit(_) => {}
    }

    for component in components {
        let nodes: Vec<Option<NodeId>> = component
            .terminals
            .iter()
            .map(|t| partition.node_of(*t))
            .collect();

        for (terminal, role) in component.terminals.iter().zip(component.kind.terminal_roles()) {
            let alone = partition
                .node_of(*terminal)
                .and_then(|node| partition.node(node))
                .map_or(true, |node| node.terminals.len() == 1);
            if alone {
                warnings.push(ValidationWarning::FloatingTerminal {
                    component: component.id,
                    terminal: *terminal,
                    role: *role,
                });
            }
        }

        if nodes.len() > 1 {
            if let Some(Some(first)) = nodes.first() {
                if nodes.iter().all(|node| *node == Some(*first)) {
                    warnings.push(ValidationWarning::ShortedComponent {
                        component: component.id,
                        node: *first,
                    });
                }
            }
        }
    }

    for warning in &warnings {
        warn!(%warning, "circuit validation");
    }

    Ok(ValidationReport {
        ground,
        node_count: partition.len(),
        warnings,
    })
}
