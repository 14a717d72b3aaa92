use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use ewb_core::topology::ElectricalNode;
use ewb_core::{
    AnalysisCmd, CircuitError, CircuitGraph, CircuitSnapshot, ComponentId, DcSweep, EngineConfig,
    Fingerprint, GroundResolution, NetlistBuilder, Position, RunId, RunRecord, SimulationEngine,
    SimulationResult, TerminalId, ValidationReport, ValidationWarning, Wire, WireId,
};

use crate::schema::{parameter_set, parse_kind, CircuitSpec, CircuitView, ComponentView, ParamValue};

pub struct HttpServerConfig {
    pub bind_addr: String,
    pub engine: EngineConfig,
}

#[derive(Debug, Default)]
struct Workspace {
    circuits: BTreeMap<usize, CircuitGraph>,
    titles: BTreeMap<usize, String>,
    next_id: usize,
}

#[derive(Clone)]
pub struct ApiState {
    workspace: Arc<Mutex<Workspace>>,
    engine: SimulationEngine,
}

impl ApiState {
    pub fn new(engine: SimulationEngine) -> Self {
        Self {
            workspace: Arc::new(Mutex::new(Workspace::default())),
            engine,
        }
    }

    fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_circuit<T>(
        &self,
        id: usize,
        f: impl FnOnce(&mut CircuitGraph) -> Result<T, CircuitError>,
    ) -> Result<T, ApiError> {
        let mut workspace = self.workspace();
        let graph = workspace
            .circuits
            .get_mut(&id)
            .ok_or_else(|| circuit_not_found(id))?;
        f(graph).map_err(ApiError)
    }

    fn snapshot(&self, id: usize) -> Result<CircuitSnapshot, ApiError> {
        self.with_circuit(id, |graph| Ok(graph.snapshot()))
    }

    /// Netlist builder titled after circuit `id`.
    fn builder(&self, id: usize) -> NetlistBuilder {
        let title = self
            .workspace()
            .titles
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("circuit {}", id));
        NetlistBuilder::new().with_title(title)
    }

    async fn simulate(
        &self,
        builder: NetlistBuilder,
        snapshot: CircuitSnapshot,
        analysis: AnalysisCmd,
    ) -> Result<RunView, ApiError> {
        let engine = self.engine.clone();
        let title = builder.title().to_string();
        let record = tokio::task::spawn_blocking(move || {
            engine.simulate_with(&builder, snapshot, analysis)?.wait()
        })
        .await
        .map_err(|err| {
            ApiError(CircuitError::SimulationFailed {
                diagnostic: format!("simulation task failed: {}", err),
            })
        })??;
        Ok(RunView {
            title: Some(title),
            ..RunView::from(record)
        })
    }
}

/// `CircuitError` rendered through the error envelope.
#[derive(Debug)]
pub struct ApiError(pub CircuitError);

impl From<CircuitError> for ApiError {
    fn from(err: CircuitError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let details = match &self.0 {
            CircuitError::ConflictingGround { nodes } => {
                Some(nodes.iter().map(|node| format!("N{}", node)).collect())
            }
            CircuitError::SimulationFailed { diagnostic } => {
                Some(diagnostic.lines().map(str::to_string).collect())
            }
            _ => None,
        };
        if status.is_server_error() {
            warn!(code = self.0.code(), err = %self.0, "request failed");
        } else {
            debug!(code = self.0.code(), err = %self.0, "request rejected");
        }
        api_error(status, self.0.code(), &self.0.to_string(), details)
    }
}

fn status_for(err: &CircuitError) -> StatusCode {
    match err {
        CircuitError::NotFound { .. } => StatusCode::NOT_FOUND,
        CircuitError::InvalidConnection(_)
        | CircuitError::ConflictingGround { .. }
        | CircuitError::EmptyCircuit
        | CircuitError::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CircuitError::Busy | CircuitError::Cancelled => StatusCode::CONFLICT,
        CircuitError::SimulationFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn circuit_not_found(id: usize) -> ApiError {
    ApiError(CircuitError::NotFound {
        what: "circuit",
        id: id.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

fn api_error(status: StatusCode, code: &str, message: &str, details: Option<Vec<String>>) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            details,
        },
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct AddComponentRequest {
    kind: String,
    #[serde(default)]
    params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateComponentRequest {
    #[serde(default)]
    params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddWireRequest {
    a: TerminalId,
    b: TerminalId,
}

#[derive(Debug, Deserialize)]
struct TranRequest {
    step: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    circuit: CircuitSpec,
    analysis: AnalysisCmd,
}

#[derive(Debug, Serialize)]
struct RemovedComponent {
    component: ComponentId,
    removed_wires: Vec<WireId>,
}

#[derive(Debug, Serialize)]
struct NetlistView {
    title: String,
    fingerprint: Fingerprint,
    ground: GroundResolution,
    nodes: Vec<String>,
    warnings: Vec<ValidationWarning>,
    deck: String,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct RunView {
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub analysis: AnalysisCmd,
    pub backend: String,
    pub fingerprint: Fingerprint,
    pub elapsed_ms: f64,
    pub result: SimulationResult,
}

impl From<RunRecord> for RunView {
    fn from(record: RunRecord) -> Self {
        Self {
            run_id: record.id,
            title: None,
            analysis: record.analysis,
            backend: record.backend,
            fingerprint: record.fingerprint,
            elapsed_ms: record.elapsed.as_secs_f64() * 1e3,
            result: record.result,
        }
    }
}

pub async fn run(config: HttpServerConfig) -> Result<(), String> {
    let engine = SimulationEngine::new(config.engine);
    let app = build_router(ApiState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|err| format!("bind {} failed: {}", config.bind_addr, err))?;
    info!(addr = %config.bind_addr, "http api listening");
    axum::serve(listener, app)
        .await
        .map_err(|err| format!("server error: {}", err))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/circuits", post(create_circuit))
        .route("/v1/circuits/{id}", get(get_circuit))
        .route("/v1/circuits/{id}/components", post(add_component))
        .route(
            "/v1/circuits/{id}/components/{cid}",
            delete(remove_component).patch(update_component),
        )
        .route("/v1/circuits/{id}/wires", post(add_wire))
        .route("/v1/circuits/{id}/wires/{wid}", delete(remove_wire))
        .route("/v1/circuits/{id}/nodes", get(get_nodes))
        .route("/v1/circuits/{id}/validate", get(validate_circuit))
        .route("/v1/circuits/{id}/netlist", get(get_netlist))
        .route("/v1/circuits/{id}/run/dc", post(run_dc))
        .route("/v1/circuits/{id}/run/tran", post(run_tran))
        .route("/v1/circuits/{id}/cancel", post(cancel_run))
        .route("/v1/runs/{id}", get(get_run))
        .route("/v1/simulate", post(simulate))
        .with_state(state)
}

async fn create_circuit(
    State(state): State<ApiState>,
    Json(spec): Json<CircuitSpec>,
) -> Result<(StatusCode, Json<CircuitView>), ApiError> {
    let loaded = spec.build_circuit()?;
    let mut workspace = state.workspace();
    workspace.next_id += 1;
    let id = workspace.next_id;
    let view = CircuitView::of(id, &loaded.graph);
    workspace.circuits.insert(id, loaded.graph);
    if let Some(title) = spec.title {
        workspace.titles.insert(id, title);
    }
    info!(circuit = id, components = view.summary.component_count, "circuit created");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_circuit(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<CircuitView>, ApiError> {
    state
        .with_circuit(id, |graph| Ok(CircuitView::of(id, graph)))
        .map(Json)
}

async fn add_component(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
    Json(request): Json<AddComponentRequest>,
) -> Result<(StatusCode, Json<ComponentView>), ApiError> {
    let kind = parse_kind(&request.kind)?;
    let params = parameter_set(&request.params)?;
    let view = state.with_circuit(id, |graph| {
        let component = graph.add_component(kind, params, request.position);
        graph.set_label(component, request.label)?;
        graph
            .component(component)
            .map(ComponentView::from)
            .ok_or_else(|| CircuitError::NotFound {
                what: "component",
                id: component.to_string(),
            })
    })?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn remove_component(
    State(state): State<ApiState>,
    Path((id, cid)): Path<(usize, usize)>,
) -> Result<Json<RemovedComponent>, ApiError> {
    let component = ComponentId(cid);
    let removed_wires = state.with_circuit(id, |graph| graph.remove_component(component))?;
    Ok(Json(RemovedComponent {
        component,
        removed_wires,
    }))
}

async fn update_component(
    State(state): State<ApiState>,
    Path((id, cid)): Path<(usize, usize)>,
    Json(request): Json<UpdateComponentRequest>,
) -> Result<Json<ComponentView>, ApiError> {
    let component = ComponentId(cid);
    let view = state.with_circuit(id, |graph| {
        let kind = graph
            .component(component)
            .map(|c| c.kind)
            .ok_or_else(|| CircuitError::NotFound {
                what: "component",
                id: component.to_string(),
            })?;
        let mut values = Vec::with_capacity(request.params.len());
        for (name, value) in &request.params {
            if kind.parameter_spec(name).is_none() {
                return Err(CircuitError::InvalidParameter(format!(
                    "{} has no parameter {}",
                    kind, name
                )));
            }
            values.push((name.as_str(), value.resolve(name)?));
        }
        for (name, value) in values {
            graph.set_parameter(component, name, value)?;
        }
        if let Some(position) = request.position {
            graph.move_component(component, position)?;
        }
        if request.label.is_some() {
            graph.set_label(component, request.label)?;
        }
        graph
            .component(component)
            .map(ComponentView::from)
            .ok_or_else(|| CircuitError::NotFound {
                what: "component",
                id: component.to_string(),
            })
    })?;
    Ok(Json(view))
}

async fn add_wire(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
    Json(request): Json<AddWireRequest>,
) -> Result<(StatusCode, Json<Wire>), ApiError> {
    let wire = state.with_circuit(id, |graph| {
        let wire = graph.add_wire(request.a, request.b)?;
        graph.wire(wire).copied().ok_or_else(|| CircuitError::NotFound {
            what: "wire",
            id: wire.to_string(),
        })
    })?;
    Ok((StatusCode::CREATED, Json(wire)))
}

async fn remove_wire(
    State(state): State<ApiState>,
    Path((id, wid)): Path<(usize, usize)>,
) -> Result<Json<Wire>, ApiError> {
    state
        .with_circuit(id, |graph| graph.remove_wire(WireId(wid)))
        .map(Json)
}

async fn get_nodes(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<Vec<ElectricalNode>>, ApiError> {
    state
        .with_circuit(id, |graph| Ok(graph.compute_nodes().nodes().to_vec()))
        .map(Json)
}

async fn validate_circuit(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<ValidationReport>, ApiError> {
    state.with_circuit(id, |graph| graph.validate()).map(Json)
}

async fn get_netlist(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<NetlistView>, ApiError> {
    let snapshot = state.snapshot(id)?;
    let netlist = state.builder(id).build(&snapshot)?;
    Ok(Json(NetlistView {
        title: netlist.title().to_string(),
        fingerprint: netlist.fingerprint(),
        ground: netlist.ground(),
        nodes: netlist.node_names().to_vec(),
        warnings: netlist.warnings().to_vec(),
        deck: netlist.to_spice(&AnalysisCmd::operating_point()),
    }))
}

async fn run_dc(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
    Json(sweep): Json<DcSweep>,
) -> Result<Json<RunView>, ApiError> {
    let snapshot = state.snapshot(id)?;
    state
        .simulate(state.builder(id), snapshot, AnalysisCmd::Dc(sweep))
        .await
        .map(Json)
}

async fn run_tran(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
    Json(request): Json<TranRequest>,
) -> Result<Json<RunView>, ApiError> {
    let snapshot = state.snapshot(id)?;
    state
        .simulate(state.builder(id), snapshot, AnalysisCmd::transient(request.step, request.end))
        .await
        .map(Json)
}

async fn cancel_run(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<CancelResponse>, ApiError> {
    state.with_circuit(id, |_| Ok(()))?;
    Ok(Json(CancelResponse {
        cancelled: state.engine.cancel(),
    }))
}

async fn get_run(
    State(state): State<ApiState>,
    Path(id): Path<usize>,
) -> Result<Json<RunView>, ApiError> {
    state
        .engine
        .run_record(RunId(id))
        .map(|record| Json(RunView::from(record)))
        .ok_or_else(|| {
            ApiError(CircuitError::NotFound {
                what: "run",
                id: id.to_string(),
            })
        })
}

async fn simulate(
    State(state): State<ApiState>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<RunView>, ApiError> {
    let loaded = request.circuit.build_circuit()?;
    let builder = match &request.circuit.title {
        Some(title) => NetlistBuilder::new().with_title(title.clone()),
        None => NetlistBuilder::new(),
    };
    state
        .simulate(builder, loaded.graph.snapshot(), request.analysis)
        .await
        .map(Json)
}
