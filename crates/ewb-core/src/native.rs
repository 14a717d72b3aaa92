//! Built-in reference solver
//!
//! Linear MNA with a dense LU solve: DC operating point, DC source sweep and
//! fixed-step backward-Euler transient. Output follows the rawfile layout the
//! process backend produces, with SPICE current signs.

use ewb_devices::{DeviceKind, DeviceRecord, DeviceValue};
use std::time::Instant;
use tracing::debug;

use crate::analysis::{AnalysisCmd, DcSweep};
use crate::backend::{
    CancelToken, RawOutput, RawVariable, SolveRequest, SolverBackend, SolverFailure, VarKind,
};
use crate::mna::MnaBuilder;
use crate::netlist::Netlist;
use crate::solver::{DenseSolver, LinearSolver};
use crate::stamp::{branch_voltage, node_voltage, DeviceStamp, TransientState};

pub const DEFAULT_GMIN: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct NativeBackend {
    gmin: f64,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self { gmin: DEFAULT_GMIN }
    }
}

enum Sample<'a> {
    Dc,
    Tran {
        time: f64,
        dt: f64,
        previous: &'a TransientState,
    },
}

impl NativeBackend {
    pub fn new(gmin: f64) -> Self {
        Self { gmin }
    }

    pub fn gmin(&self) -> f64 {
        self.gmin
    }

    fn operating_point(&self, netlist: &Netlist) -> Result<RawOutput, SolverFailure> {
        let (mna, x) = self.solve_dc(netlist, netlist.devices(), "operating point")?;
        Ok(RawOutput {
            plot_name: "Operating Point".to_string(),
            variables: variables(netlist, None),
            points: vec![sample(netlist.devices(), &mna, &x, &Sample::Dc)],
        })
    }

    fn sweep(
        &self,
        netlist: &Netlist,
        sweep: &DcSweep,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure> {
        let DcSweep::Source { source, .. } = sweep else {
            return self.operating_point(netlist);
        };
        let target = netlist
            .device(source)
            .filter(|device| device.kind.is_source())
            .ok_or_else(|| {
                SolverFailure::Diagnostic(format!("sweep source {} not found", source))
            })?;
        let target_name = target.name.clone();

        let mut points = Vec::new();
        for value in sweep.points() {
            if cancel.is_cancelled() {
                return Err(SolverFailure::Cancelled);
            }
            let devices: Vec<DeviceRecord> = netlist
                .devices()
                .iter()
                .map(|device| match &device.value {
                    DeviceValue::Source(waveform) if device.name == target_name => DeviceRecord {
                        value: DeviceValue::Source(waveform.with_dc_value(value)),
                        ..device.clone()
                    },
                    _ => device.clone(),
                })
                .collect();
            let context = format!("dc sweep {}={}", target_name, value);
            let (mna, x) = self.solve_dc(netlist, &devices, &context)?;
            let mut row = vec![value];
            row.extend(sample(&devices, &mna, &x, &Sample::Dc));
            points.push(row);
        }

        Ok(RawOutput {
            plot_name: "DC transfer characteristic".to_string(),
            variables: variables(
                netlist,
                Some(RawVariable::new(target_name.to_ascii_lowercase(), VarKind::Sweep)),
            ),
            points,
        })
    }

    fn transient(
        &self,
        netlist: &Netlist,
        step: f64,
        end: f64,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure> {
        let devices = netlist.devices();
        let (mna, x) = self.solve_dc(netlist, devices, "initial operating point")?;
        let mut state = TransientState::default();
        record_state(devices, &mna, &x, &mut state);

        let mut first = vec![0.0];
        first.extend(sample(devices, &mna, &x, &Sample::Dc));
        let mut points = vec![first];

        let steps = (end / step - 1e-9).ceil().max(1.0) as usize;
        let mut previous_time = 0.0;
        for index in 1..=steps {
            if cancel.is_cancelled() {
                return Err(SolverFailure::Cancelled);
            }
            let time = (index as f64 * step).min(end);
            let dt = time - previous_time;

            let mut mna = MnaBuilder::new(netlist.node_count());
            mna.apply_gmin(self.gmin);
            for device in devices {
                device
                    .stamp_tran(&mut mna.context(), time, dt, &state)
                    .map_err(|err| SolverFailure::Diagnostic(err.to_string()))?;
            }
            let x = solve_linear(&mut mna, &format!("transient at t={:e}", time))?;

            let mut row = vec![time];
            row.extend(sample(
                devices,
                &mna,
                &x,
                &Sample::Tran {
                    time,
                    dt,
                    previous: &state,
                },
            ));
            points.push(row);

            let mut next = TransientState::default();
            record_state(devices, &mna, &x, &mut next);
            state = next;
            previous_time = time;
        }

        Ok(RawOutput {
            plot_name: "Transient Analysis".to_string(),
            variables: variables(netlist, Some(RawVariable::new("time", VarKind::Time))),
            points,
        })
    }

    fn solve_dc(
        &self,
        netlist: &Netlist,
        devices: &[DeviceRecord],
        context: &str,
    ) -> Result<(MnaBuilder, Vec<f64>), SolverFailure> {
        let mut mna = MnaBuilder::new(netlist.node_count());
        mna.apply_gmin(self.gmin);
        for device in devices {
            device
                .stamp_dc(&mut mna.context())
                .map_err(|err| SolverFailure::Diagnostic(err.to_string()))?;
        }
        let x = solve_linear(&mut mna, context)?;
        Ok((mna, x))
    }
}

impl SolverBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn solve(
        &mut self,
        request: &SolveRequest,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure> {
        let started = Instant::now();
        let netlist = request.netlist.as_ref();
        let output = match &request.analysis {
            AnalysisCmd::Transient { step, end } => self.transient(netlist, *step, *end, cancel),
            AnalysisCmd::Dc(DcSweep::OperatingPoint) => self.operating_point(netlist),
            AnalysisCmd::Dc(sweep) => self.sweep(netlist, sweep, cancel),
        }?;
        debug!(
            analysis = %request.analysis,
            points = output.points.len(),
            variables = output.variables.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "native solve finished"
        );
        Ok(output)
    }
}

fn solve_linear(mna: &mut MnaBuilder, context: &str) -> Result<Vec<f64>, SolverFailure> {
    let n = mna.size();
    let (ap, ai, ax) = mna.builder.finalize();
    let mut solver = DenseSolver::new(n);
    solver.prepare(n);
    let mut x = mna.rhs.clone();
    solver
        .analyze(&ap, &ai)
        .and_then(|_| solver.factor(&ap, &ai, &ax))
        .and_then(|_| solver.solve(&mut x))
        .map_err(|err| {
            SolverFailure::Diagnostic(format!(
                "{}: {} (voltage source loop or inductor/source cut-set?)",
                context, err
            ))
        })?;
    if x.iter().any(|value| !value.is_finite()) {
        return Err(SolverFailure::Diagnostic(format!(
            "{}: solution is not finite",
            context
        )));
    }
    Ok(x)
}

fn variables(netlist: &Netlist, axis: Option<RawVariable>) -> Vec<RawVariable> {
    let mut variables: Vec<RawVariable> = axis.into_iter().collect();
    for name in netlist.node_names().iter().skip(1) {
        variables.push(RawVariable::new(format!("v({})", name), VarKind::Voltage));
    }
    for device in netlist.devices() {
        variables.push(RawVariable::new(
            format!("i({})", device.name.to_ascii_lowercase()),
            VarKind::Current,
        ));
    }
    variables
}

fn sample(devices: &[DeviceRecord], mna: &MnaBuilder, x: &[f64], mode: &Sample) -> Vec<f64> {
    let mut row: Vec<f64> = x[..mna.node_rows].to_vec();
    for device in devices {
        let (a, b) = match device.nodes.as_slice() {
            [a, b] => (*a, *b),
            _ => {
                row.push(0.0);
                continue;
            }
        };
        let aux = mna
            .aux_index(&device.name)
            .and_then(|k| x.get(k).copied())
            .unwrap_or(0.0);
        let current = match (device.kind, mode) {
            (DeviceKind::Resistor, _) => {
                branch_voltage(x, a, b) / device.passive_value().unwrap_or(f64::INFINITY)
            }
            (DeviceKind::Capacitor, Sample::Dc) => 0.0,
            (DeviceKind::Capacitor, Sample::Tran { dt, previous, .. }) => {
                let c = device.passive_value().unwrap_or(0.0);
                let v_prev = previous.cap_voltage.get(&device.name).copied().unwrap_or(0.0);
                c / dt * (branch_voltage(x, a, b) - v_prev)
            }
            (DeviceKind::Inductor, _) | (DeviceKind::VoltageSource, _) => aux,
            (DeviceKind::CurrentSource, Sample::Dc) => {
                device.waveform().map_or(0.0, |w| w.dc_value())
            }
            (DeviceKind::CurrentSource, Sample::Tran { time, .. }) => {
                device.waveform().map_or(0.0, |w| w.value_at(*time))
            }
        };
        row.push(current);
    }
    row
}

fn record_state(devices: &[DeviceRecord], mna: &MnaBuilder, x: &[f64], state: &mut TransientState) {
    for device in devices {
        match (device.kind, device.nodes.as_slice()) {
            (DeviceKind::Capacitor, [a, b]) => {
                state
                    .cap_voltage
                    .insert(device.name.clone(), node_voltage(x, *a) - node_voltage(x, *b));
            }
            (DeviceKind::Inductor, _) => {
                if let Some(current) = mna.aux_index(&device.name).and_then(|k| x.get(k)) {
                    state.ind_current.insert(device.name.clone(), *current);
                }
            }
            _ => {}
        }
    }
}
