use ewb_devices::{DeviceKind, DeviceRecord, NodeRef, SourceWaveform};
use std::collections::HashMap;
use thiserror::Error;

use crate::mna::StampContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampError {
    #[error("{0}: element value missing")]
    MissingValue(String),
    #[error("{0}: expected two nodes")]
    InvalidNodes(String),
}

pub trait DeviceStamp {
    /// Operating point: capacitors open, inductors as zero-volt branches.
    fn stamp_dc(&self, ctx: &mut StampContext) -> Result<(), StampError>;

    /// One backward-Euler step ending at `time`.
    fn stamp_tran(
        &self,
        ctx: &mut StampContext,
        time: f64,
        dt: f64,
        state: &TransientState,
    ) -> Result<(), StampError>;
}

/// Reactive element history carried between time points.
#[derive(Debug, Default, Clone)]
pub struct TransientState {
    pub cap_voltage: HashMap<String, f64>,
    pub ind_current: HashMap<String, f64>,
}

impl DeviceStamp for DeviceRecord {
    fn stamp_dc(&self, ctx: &mut StampContext) -> Result<(), StampError> {
        let (a, b) = two_nodes(self)?;
        match self.kind {
            DeviceKind::Resistor => {
                ctx.conductance(a, b, 1.0 / passive(self)?);
            }
            DeviceKind::Capacitor => {}
            DeviceKind::Inductor => {
                let k = ctx.allocate_aux(&self.name);
                ctx.branch(a, b, k);
            }
            DeviceKind::VoltageSource => {
                let k = ctx.allocate_aux(&self.name);
                ctx.branch(a, b, k);
                ctx.add_rhs(k, waveform(self)?.dc_value());
            }
            DeviceKind::CurrentSource => {
                ctx.current(a, b, waveform(self)?.dc_value());
            }
        }
        Ok(())
    }

    fn stamp_tran(
        &self,
        ctx: &mut StampContext,
        time: f64,
        dt: f64,
        state: &TransientState,
    ) -> Result<(), StampError> {
        let (a, b) = two_nodes(self)?;
        match self.kind {
            DeviceKind::Resistor => {
                ctx.conductance(a, b, 1.0 / passive(self)?);
            }
            DeviceKind::Capacitor => {
                let g = passive(self)? / dt;
                let v_prev = state.cap_voltage.get(&self.name).copied().unwrap_or(0.0);
                ctx.conductance(a, b, g);
                // history current source g*v_prev pushed from b into a
                ctx.current(b, a, g * v_prev);
            }
            DeviceKind::Inductor => {
                let l = passive(self)?;
                let k = ctx.allocate_aux(&self.name);
                let i_prev = state.ind_current.get(&self.name).copied().unwrap_or(0.0);
                let r = -(l / dt);
                ctx.branch(a, b, k);
                ctx.add(k, k, r);
                ctx.add_rhs(k, r * i_prev);
            }
            DeviceKind::VoltageSource => {
                let k = ctx.allocate_aux(&self.name);
                ctx.branch(a, b, k);
                ctx.add_rhs(k, waveform(self)?.value_at(time));
            }
            DeviceKind::CurrentSource => {
                ctx.current(a, b, waveform(self)?.value_at(time));
            }
        }
        Ok(())
    }
}

fn two_nodes(record: &DeviceRecord) -> Result<(NodeRef, NodeRef), StampError> {
    match record.nodes.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(StampError::InvalidNodes(record.name.clone())),
    }
}

fn passive(record: &DeviceRecord) -> Result<f64, StampError> {
    record
        .passive_value()
        .ok_or_else(|| StampError::MissingValue(record.name.clone()))
}

fn waveform(record: &DeviceRecord) -> Result<&SourceWaveform, StampError> {
    record
        .waveform()
        .ok_or_else(|| StampError::MissingValue(record.name.clone()))
}

/// Voltage across `a`..`b` in solution `x`.
pub fn branch_voltage(x: &[f64], a: NodeRef, b: NodeRef) -> f64 {
    node_voltage(x, a) - node_voltage(x, b)
}

pub fn node_voltage(x: &[f64], node: NodeRef) -> f64 {
    StampContext::row(node)
        .and_then(|row| x.get(row).copied())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mna::MnaBuilder;
    use ewb_devices::DeviceValue;

    #[test]
    fn voltage_source_adds_branch_row() {
        let record = DeviceRecord {
            name: "V1".to_string(),
            kind: DeviceKind::VoltageSource,
            nodes: vec![NodeRef(1), NodeRef::GROUND],
            value: DeviceValue::Source(SourceWaveform::Dc { value: 5.0 }),
        };
        let mut mna = MnaBuilder::new(2);
        record.stamp_dc(&mut mna.context()).unwrap();
        assert_eq!(mna.size(), 2);
        assert_eq!(mna.rhs, vec![0.0, 5.0]);
    }

    #[test]
    fn capacitor_is_open_at_dc() {
        let record = DeviceRecord {
            name: "C1".to_string(),
            kind: DeviceKind::Capacitor,
            nodes: vec![NodeRef(1), NodeRef::GROUND],
            value: DeviceValue::Passive(1e-6),
        };
        let mut mna = MnaBuilder::new(2);
        record.stamp_dc(&mut mna.context()).unwrap();
        let (_, ai, _) = mna.builder.finalize();
        assert!(ai.is_empty());
    }
}
