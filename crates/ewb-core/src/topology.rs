//! Electrical node partition
//!
//! Terminals joined transitively by wires share a node. The partition is
//! computed with a union-find over dense terminal indices, so the cost is
//! O(T + W·α(T)). Node ids follow the smallest terminal id in each set, which
//! keeps numbering stable for an unchanged graph.

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::graph::TerminalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectricalNode {
    pub id: NodeId,
    /// Ascending terminal ids.
    pub terminals: Vec<TerminalId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePartition {
    nodes: Vec<ElectricalNode>,
    terminal_node: BTreeMap<TerminalId, NodeId>,
}

impl NodePartition {
    /// Partition `terminals` by the `wires` edge set.
    ///
    /// Edges naming a terminal outside `terminals` are ignored.
    pub fn compute<I, W>(terminals: I, wires: W) -> Self
    where
        I: IntoIterator<Item = TerminalId>,
        W: IntoIterator<Item = (TerminalId, TerminalId)>,
    {
        let mut order: Vec<TerminalId> = terminals.into_iter().collect();
        order.sort_unstable();
        order.dedup();

        let mut sets = UnionFind::<usize>::new(order.len());
        for (a, b) in wires {
            if let (Ok(ia), Ok(ib)) = (order.binary_search(&a), order.binary_search(&b)) {
                sets.union(ia, ib);
            }
        }

        let mut root_node: BTreeMap<usize, NodeId> = BTreeMap::new();
        let mut nodes: Vec<ElectricalNode> = Vec::new();
        let mut terminal_node = BTreeMap::new();
        for (index, terminal) in order.iter().enumerate() {
            let root = sets.find(index);
            let node = *root_node.entry(root).or_insert_with(|| {
                let id = NodeId(nodes.len());
                nodes.push(ElectricalNode {
                    id,
                    terminals: Vec::new(),
                });
                id
            });
            nodes[node.0].terminals.push(*terminal);
            terminal_node.insert(*terminal, node);
        }

        Self {
            nodes,
            terminal_node,
        }
    }

    pub fn nodes(&self) -> &[ElectricalNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&ElectricalNode> {
        self.nodes.get(id.0)
    }

    pub fn node_of(&self, terminal: TerminalId) -> Option<NodeId> {
        self.terminal_node.get(&terminal).copied()
    }

    pub fn connected(&self, a: TerminalId, b: TerminalId) -> bool {
        match (self.node_of(a), self.node_of(b)) {
            (Some(na), Some(nb)) => na == nb,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_node.len()
    }
}
