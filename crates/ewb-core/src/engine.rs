//! Simulation run lifecycle
//!
//! The engine owns one solver backend and guarantees at most one in-flight
//! invocation. A request first reserves the single run slot (waiting or
//! failing with `Busy` per `BusyPolicy`), then builds or accepts a netlist,
//! then hands it to a worker thread. The caller gets a `RunHandle` whose
//! outcome arrives over a channel.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::analysis::{AnalysisCmd, DcSweep};
use crate::backend::{CancelToken, SolveRequest, SolverBackend};
use crate::config::{BusyPolicy, EngineConfig};
use crate::error::{CircuitError, Result};
use crate::graph::{CircuitGraph, CircuitSnapshot};
use crate::netlist::{Netlist, NetlistBuilder};
use crate::result_store::{ResultStore, RunId, RunRecord, SimulationResult};
use crate::session::{RunState, Session};

#[derive(Debug, Default)]
struct Slot {
    session: Session,
    in_flight: Option<CancelToken>,
    next_run: u64,
}

struct EngineInner {
    config: EngineConfig,
    builder: NetlistBuilder,
    backend: Mutex<Box<dyn SolverBackend>>,
    backend_name: &'static str,
    slot: Mutex<Slot>,
    slot_freed: Condvar,
    store: Mutex<ResultStore>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineInner {
    /// Reserve the run slot for a new run.
    fn acquire(&self, first_state: RunState) -> Result<(u64, CancelToken)> {
        let mut slot = lock(&self.slot);
        while slot.in_flight.is_some() {
            match self.config.busy_policy {
                BusyPolicy::Reject => {
                    debug!("run rejected, engine busy");
                    return Err(CircuitError::Busy);
                }
                BusyPolicy::Queue => {
                    slot = self
                        .slot_freed
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        slot.next_run += 1;
        let run = slot.next_run;
        let token = CancelToken::new();
        slot.in_flight = Some(token.clone());
        slot.session.begin(run, first_state);
        Ok((run, token))
    }

    fn transition(&self, next: RunState) {
        lock(&self.slot).session.transition(next);
    }

    /// Free the slot, recording how the run ended.
    fn release(&self, outcome: std::result::Result<(), &CircuitError>) {
        let mut slot = lock(&self.slot);
        match outcome {
            Ok(()) => {
                slot.session.transition(RunState::Completed);
            }
            Err(err) => slot.session.fail(err.clone()),
        }
        slot.in_flight = None;
        drop(slot);
        self.slot_freed.notify_all();
    }

    fn execute(&self, request: &SolveRequest, token: &CancelToken) -> Result<RunRecord> {
        self.transition(RunState::Running);
        let started = Instant::now();
        let raw = {
            let mut backend = lock(&self.backend);
            backend.solve(request, token)
        };
        if token.is_cancelled() {
            return Err(CircuitError::Cancelled);
        }
        let result = SimulationResult::from_raw(&request.analysis, raw?)?;
        let elapsed = started.elapsed();

        let mut store = lock(&self.store);
        let id = store.add_run(
            request.analysis.clone(),
            request.netlist.fingerprint(),
            self.backend_name,
            elapsed,
            result,
        );
        store
            .get(id)
            .cloned()
            .ok_or_else(|| CircuitError::not_found("run", id.0))
    }
}

/// Shared handle to a simulation engine. Clones drive the same engine.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("backend", &self.inner.backend_name)
            .field("state", &self.state())
            .finish()
    }
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let backend = config.build_backend();
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: EngineConfig, backend: Box<dyn SolverBackend>) -> Self {
        let backend_name = backend.name();
        let store = ResultStore::new(config.max_stored_runs);
        info!(backend = backend_name, policy = ?config.busy_policy, "simulation engine ready");
        Self {
            inner: Arc::new(EngineInner {
                config,
                builder: NetlistBuilder::new(),
                backend: Mutex::new(backend),
                backend_name,
                slot: Mutex::new(Slot::default()),
                slot_freed: Condvar::new(),
                store: Mutex::new(store),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name
    }

    /// State of the most recent run.
    pub fn state(&self) -> RunState {
        lock(&self.inner.slot).session.state
    }

    pub fn last_error(&self) -> Option<CircuitError> {
        lock(&self.inner.slot).session.last_error.clone()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.inner.slot).in_flight.is_some()
    }

    /// Blocking transient run.
    pub fn run_transient(
        &self,
        netlist: impl Into<Arc<Netlist>>,
        step_size: f64,
        end_time: f64,
    ) -> Result<SimulationResult> {
        self.submit(netlist, AnalysisCmd::transient(step_size, end_time))?
            .wait()
            .map(|record| record.result)
    }

    /// Blocking DC operating point or source sweep.
    pub fn run_dc(&self, netlist: impl Into<Arc<Netlist>>, sweep: DcSweep) -> Result<SimulationResult> {
        self.submit(netlist, AnalysisCmd::Dc(sweep))?
            .wait()
            .map(|record| record.result)
    }

    /// Start a run against an already built netlist.
    pub fn submit(&self, netlist: impl Into<Arc<Netlist>>, analysis: AnalysisCmd) -> Result<RunHandle> {
        analysis.validate()?;
        let netlist = netlist.into();
        check_sources(&netlist, &analysis)?;
        let (run, token) = self.inner.acquire(RunState::Submitted)?;
        self.dispatch(run, token, netlist, analysis)
    }

    /// Snapshot `graph`, build its netlist and start a run.
    ///
    /// Build failures are returned here, before anything reaches the solver.
    pub fn simulate(&self, graph: &CircuitGraph, analysis: AnalysisCmd) -> Result<RunHandle> {
        self.simulate_snapshot(graph.snapshot(), analysis)
    }

    pub fn simulate_snapshot(&self, snapshot: CircuitSnapshot, analysis: AnalysisCmd) -> Result<RunHandle> {
        self.simulate_with(&self.inner.builder, snapshot, analysis)
    }

    /// Same as `simulate_snapshot`, building the netlist with `builder`.
    pub fn simulate_with(
        &self,
        builder: &NetlistBuilder,
        snapshot: CircuitSnapshot,
        analysis: AnalysisCmd,
    ) -> Result<RunHandle> {
        analysis.validate()?;
        let (run, token) = self.inner.acquire(RunState::Building)?;
        let built = builder
            .build(&snapshot)
            .and_then(|netlist| check_sources(&netlist, &analysis).map(|_| netlist));
        let netlist = match built {
            Ok(netlist) => Arc::new(netlist),
            Err(err) => {
                warn!(run, %err, "netlist build failed");
                self.inner.release(Err(&err));
                return Err(err);
            }
        };
        self.inner.transition(RunState::Submitted);
        self.dispatch(run, token, netlist, analysis)
    }

    /// Cancel the in-flight run, if any.
    pub fn cancel(&self) -> bool {
        match &lock(&self.inner.slot).in_flight {
            Some(token) => {
                info!("cancel requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn last_result(&self) -> Option<RunRecord> {
        lock(&self.inner.store).latest().cloned()
    }

    pub fn run_record(&self, id: RunId) -> Option<RunRecord> {
        lock(&self.inner.store).get(id).cloned()
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&ResultStore) -> R) -> R {
        f(&lock(&self.inner.store))
    }

    fn dispatch(
        &self,
        run: u64,
        token: CancelToken,
        netlist: Arc<Netlist>,
        analysis: AnalysisCmd,
    ) -> Result<RunHandle> {
        if self.inner.config.cache_results {
            let cached = lock(&self.inner.store)
                .find(netlist.fingerprint(), &analysis)
                .cloned();
            if let Some(record) = cached {
                debug!(run, id = record.id.0, "result cache hit");
                self.inner.release(Ok(()));
                return Ok(RunHandle::ready(run, token, Ok(record)));
            }
        }

        let (sender, receiver) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let worker_token = token.clone();
        let request = SolveRequest { netlist, analysis };
        let spawned = thread::Builder::new()
            .name(format!("ewb-run-{}", run))
            .spawn(move || {
                let outcome = inner.execute(&request, &worker_token);
                match &outcome {
                    Ok(record) => info!(
                        run,
                        id = record.id.0,
                        samples = record.result.sample_count(),
                        elapsed_ms = record.elapsed.as_millis() as u64,
                        "run completed"
                    ),
                    Err(err) => warn!(run, %err, "run failed"),
                }
                inner.release(outcome.as_ref().map(|_| ()));
                // receiver gone means the caller stopped listening
                let _ = sender.send(outcome);
            });

        match spawned {
            Ok(_) => Ok(RunHandle {
                run,
                cancel: token,
                receiver: Some(receiver),
                outcome: None,
            }),
            Err(err) => {
                let err = CircuitError::SimulationFailed {
                    diagnostic: format!("failed to start solver worker: {}", err),
                };
                self.inner.release(Err(&err));
                Err(err)
            }
        }
    }
}

fn check_sources(netlist: &Netlist, analysis: &AnalysisCmd) -> Result<()> {
    if let AnalysisCmd::Dc(DcSweep::Source { source, .. }) = analysis {
        if !netlist.has_source(source) {
            return Err(CircuitError::InvalidParameter(format!(
                "dc sweep source {} is not an independent source in this netlist",
                source
            )));
        }
    }
    Ok(())
}

/// Pending or finished run.
#[derive(Debug)]
pub struct RunHandle {
    run: u64,
    cancel: CancelToken,
    receiver: Option<Receiver<Result<RunRecord>>>,
    outcome: Option<Result<RunRecord>>,
}

impl RunHandle {
    fn ready(run: u64, cancel: CancelToken, outcome: Result<RunRecord>) -> Self {
        Self {
            run,
            cancel,
            receiver: None,
            outcome: Some(outcome),
        }
    }

    /// Engine-local run number.
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Request cancellation. The outcome becomes `Cancelled` whether or not
    /// the solver stops early.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Block until the run finishes.
    pub fn wait(mut self) -> Result<RunRecord> {
        let outcome = match (self.outcome.take(), self.receiver.take()) {
            (Some(outcome), _) => outcome,
            (None, Some(receiver)) => receiver.recv().unwrap_or_else(|_| Err(worker_gone())),
            (None, None) => Err(worker_gone()),
        };
        self.deliver(outcome)
    }

    /// Non-blocking poll; `None` while the run is still going.
    pub fn try_result(&mut self) -> Option<Result<RunRecord>> {
        if self.outcome.is_none() {
            if let Some(receiver) = &self.receiver {
                match receiver.try_recv() {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(TryRecvError::Empty) => return None,
                    Err(TryRecvError::Disconnected) => self.outcome = Some(Err(worker_gone())),
                }
                self.receiver = None;
            }
        }
        let outcome = self.outcome.clone()?;
        Some(self.deliver(outcome))
    }

    fn deliver(&self, outcome: Result<RunRecord>) -> Result<RunRecord> {
        if self.cancel.is_cancelled() {
            return Err(CircuitError::Cancelled);
        }
        outcome
    }
}

fn worker_gone() -> CircuitError {
    CircuitError::SimulationFailed {
        diagnostic: "solver worker exited without a result".to_string(),
    }
}
