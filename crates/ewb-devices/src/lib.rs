//! Component model for the workbench
//!
//! ## Module Structure
//!
//! - `kind`: `ComponentKind` with terminal arity, parameter schema and device emission
//! - `params`: `ParameterSet`, per-parameter constraints and `ParameterError`
//! - `record`: solver-facing `DeviceRecord` and `NodeRef`
//! - `waveform`: DC / SIN / PULSE source descriptions
//! - `units`: SPICE engineering-notation values
//!
//! ## Usage
//!
//! ```
//! use ewb_devices::{ComponentKind, NodeRef};
//!
//! let params = ComponentKind::Resistor.default_parameters();
//! let record = ComponentKind::Resistor
//!     .emit_device_record("R1".to_string(), vec![NodeRef(1), NodeRef::GROUND], &params)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(record.passive_value(), Some(1e3));
//! ```

pub mod kind;
pub mod params;
pub mod record;
pub mod units;
pub mod waveform;

pub use kind::{ComponentKind, TerminalRole};
pub use params::{Constraint, ParamSpec, ParameterError, ParameterSet};
pub use record::{DeviceKind, DeviceRecord, DeviceValue, NodeRef};
pub use units::{format_spice_value, parse_spice_value, Unit};
pub use waveform::SourceWaveform;
