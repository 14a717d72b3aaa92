//! HTTP editing and simulation service
//!
//! Circuits live in server memory and are edited through `/v1/circuits`.
//! Runs go through one shared `SimulationEngine`; failures use the
//! `{ "error": { code, message, details } }` envelope.

pub mod http;
pub mod schema;

pub use http::{build_router, run, ApiError, ApiState, HttpServerConfig, RunView};
pub use schema::{CircuitSpec, LoadedCircuit};
