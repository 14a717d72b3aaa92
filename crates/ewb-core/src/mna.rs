//! Modified nodal analysis assembly
//!
//! Unknowns are the non-ground node voltages (node `k` lives in row `k - 1`)
//! followed by auxiliary branch currents for voltage sources and inductors.

use ewb_devices::NodeRef;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct AuxVarTable {
    pub name_to_id: HashMap<String, usize>,
    pub id_to_name: Vec<String>,
}

impl AuxVarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.name_to_id.get(name).copied()
    }

    pub fn allocate_with_flag(&mut self, name: &str) -> (usize, bool) {
        if let Some(id) = self.name_to_id.get(name) {
            return (*id, false);
        }
        let id = self.id_to_name.len();
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        (id, true)
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SparseBuilder {
    pub n: usize,
    pub col_entries: Vec<Vec<(usize, f64)>>,
}

impl SparseBuilder {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            col_entries: vec![Vec::new(); n],
        }
    }

    pub fn insert(&mut self, col: usize, row: usize, value: f64) {
        if col >= self.n {
            return;
        }
        self.col_entries[col].push((row, value));
    }

    pub fn resize(&mut self, new_n: usize) {
        if new_n <= self.n {
            return;
        }
        self.col_entries.resize_with(new_n, Vec::new);
        self.n = new_n;
    }

    /// Compressed-sparse-column arrays with duplicate entries summed.
    pub fn finalize(&mut self) -> (Vec<i64>, Vec<i64>, Vec<f64>) {
        let mut ap = Vec::with_capacity(self.n + 1);
        let mut ai = Vec::new();
        let mut ax: Vec<f64> = Vec::new();

        ap.push(0);
        for col in &mut self.col_entries {
            col.sort_by_key(|(row, _)| *row);
            let mut last_row = None;
            for (row, value) in col.iter() {
                if last_row == Some(*row) {
                    if let Some(tail) = ax.last_mut() {
                        *tail += *value;
                    }
                    continue;
                }
                ai.push(*row as i64);
                ax.push(*value);
                last_row = Some(*row);
            }
            ap.push(ai.len() as i64);
        }

        (ap, ai, ax)
    }
}

#[derive(Debug)]
pub struct StampContext<'a> {
    pub builder: &'a mut SparseBuilder,
    pub rhs: &'a mut Vec<f64>,
    pub aux: &'a mut AuxVarTable,
    /// Non-ground node count, i.e. the index of the first aux row.
    pub node_rows: usize,
}

impl<'a> StampContext<'a> {
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        self.builder.insert(j, i, value);
    }

    pub fn add_rhs(&mut self, i: usize, value: f64) {
        if let Some(entry) = self.rhs.get_mut(i) {
            *entry += value;
        }
    }

    pub fn row(node: NodeRef) -> Option<usize> {
        if node.is_ground() {
            None
        } else {
            Some(node.0 - 1)
        }
    }

    /// Conductance `g` between `a` and `b`.
    pub fn conductance(&mut self, a: NodeRef, b: NodeRef, g: f64) {
        let (ra, rb) = (Self::row(a), Self::row(b));
        if let Some(ra) = ra {
            self.add(ra, ra, g);
        }
        if let Some(rb) = rb {
            self.add(rb, rb, g);
        }
        if let (Some(ra), Some(rb)) = (ra, rb) {
            self.add(ra, rb, -g);
            self.add(rb, ra, -g);
        }
    }

    /// Current `i` leaving `a` and entering `b` through the element.
    pub fn current(&mut self, a: NodeRef, b: NodeRef, i: f64) {
        if let Some(ra) = Self::row(a) {
            self.add_rhs(ra, -i);
        }
        if let Some(rb) = Self::row(b) {
            self.add_rhs(rb, i);
        }
    }

    /// Couple branch row `k` to its terminals: `v(a) - v(b)` in row `k`,
    /// branch current leaving `a` and entering `b`.
    pub fn branch(&mut self, a: NodeRef, b: NodeRef, k: usize) {
        if let Some(ra) = Self::row(a) {
            self.add(ra, k, 1.0);
            self.add(k, ra, 1.0);
        }
        if let Some(rb) = Self::row(b) {
            self.add(rb, k, -1.0);
            self.add(k, rb, -1.0);
        }
    }

    pub fn allocate_aux(&mut self, name: &str) -> usize {
        let (aux_id, is_new) = self.aux.allocate_with_flag(name);
        let index = self.node_rows + aux_id;
        if is_new {
            self.builder.resize(self.node_rows + self.aux.len());
            self.rhs.resize(self.builder.n, 0.0);
        }
        index
    }
}

#[derive(Debug)]
pub struct MnaBuilder {
    pub node_rows: usize,
    pub rhs: Vec<f64>,
    pub builder: SparseBuilder,
    pub aux: AuxVarTable,
}

impl MnaBuilder {
    /// `node_count` includes ground.
    pub fn new(node_count: usize) -> Self {
        let node_rows = node_count.saturating_sub(1);
        Self {
            node_rows,
            rhs: vec![0.0; node_rows],
            builder: SparseBuilder::new(node_rows),
            aux: AuxVarTable::new(),
        }
    }

    pub fn context(&mut self) -> StampContext<'_> {
        StampContext {
            builder: &mut self.builder,
            rhs: &mut self.rhs,
            aux: &mut self.aux,
            node_rows: self.node_rows,
        }
    }

    /// Shunt every node to ground so floating nodes stay solvable.
    pub fn apply_gmin(&mut self, gmin: f64) {
        if gmin <= 0.0 {
            return;
        }
        for row in 0..self.node_rows {
            self.builder.insert(row, row, gmin);
        }
    }

    pub fn size(&self) -> usize {
        self.builder.n
    }

    pub fn aux_index(&self, name: &str) -> Option<usize> {
        self.aux.get(name).map(|id| self.node_rows + id)
    }
}
