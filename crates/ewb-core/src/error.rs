use ewb_devices::ParameterError;
use thiserror::Error;

/// Failure of a graph edit, netlist build or simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CircuitError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("ground terminals sit on {} different nodes", nodes.len())]
    ConflictingGround { nodes: Vec<usize> },

    #[error("circuit is empty: fewer than two electrical nodes")]
    EmptyCircuit,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("simulation failed: {diagnostic}")]
    SimulationFailed { diagnostic: String },

    #[error("a simulation is already in flight")]
    Busy,

    #[error("simulation was cancelled")]
    Cancelled,
}

impl CircuitError {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        CircuitError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Stable identifier used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            CircuitError::NotFound { .. } => "NOT_FOUND",
            CircuitError::InvalidConnection(_) => "INVALID_CONNECTION",
            CircuitError::ConflictingGround { .. } => "CONFLICTING_GROUND",
            CircuitError::EmptyCircuit => "EMPTY_CIRCUIT",
            CircuitError::InvalidParameter(_) => "INVALID_PARAMETER",
            CircuitError::SimulationFailed { .. } => "SIMULATION_FAILED",
            CircuitError::Busy => "BUSY",
            CircuitError::Cancelled => "CANCELLED",
        }
    }
}

impl From<ParameterError> for CircuitError {
    fn from(err: ParameterError) -> Self {
        CircuitError::InvalidParameter(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CircuitError>;
