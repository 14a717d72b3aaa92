//! Engine configuration
//!
//! Loaded from JSON (every field optional), then overridden by the
//! `EWB_SOLVER` and `EWB_NGSPICE` environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::backend::SolverBackend;
use crate::native::{NativeBackend, DEFAULT_GMIN};
use crate::ngspice::NgspiceBackend;

pub const ENV_SOLVER: &str = "EWB_SOLVER";
pub const ENV_NGSPICE: &str = "EWB_NGSPICE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// What the engine does when a run is requested while another is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Wait for the in-flight run to finish.
    Queue,
    /// Fail immediately with `Busy`.
    #[default]
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    #[default]
    Native,
    Ngspice,
}

impl FromStr for BackendChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(BackendChoice::Native),
            "ngspice" => Ok(BackendChoice::Ngspice),
            _ => Err(ConfigError::InvalidValue {
                key: "backend",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Native => f.write_str("native"),
            BackendChoice::Ngspice => f.write_str("ngspice"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgspiceConfig {
    /// Executable name or path.
    pub executable: String,
    pub timeout_secs: u64,
}

impl Default for NgspiceConfig {
    fn default() -> Self {
        Self {
            executable: "ngspice".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub busy_policy: BusyPolicy,
    pub backend: BackendChoice,
    pub ngspice: NgspiceConfig,
    /// Node-to-ground shunt used by the native backend.
    pub gmin: f64,
    /// Reuse a completed result when the netlist fingerprint and analysis
    /// are unchanged.
    pub cache_results: bool,
    /// Completed runs kept in the result store; oldest are evicted first.
    pub max_stored_runs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::default(),
            backend: BackendChoice::default(),
            ngspice: NgspiceConfig::default(),
            gmin: DEFAULT_GMIN,
            cache_results: true,
            max_stored_runs: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Apply `EWB_SOLVER` / `EWB_NGSPICE` from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(solver) = lookup(ENV_SOLVER).filter(|v| !v.trim().is_empty()) {
            self.backend = solver.parse()?;
        }
        if let Some(executable) = lookup(ENV_NGSPICE).filter(|v| !v.trim().is_empty()) {
            self.ngspice.executable = executable;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gmin.is_finite() || self.gmin < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "gmin",
                value: self.gmin.to_string(),
            });
        }
        if self.ngspice.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ngspice.timeout_secs",
                value: "0".to_string(),
            });
        }
        if self.ngspice.executable.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ngspice.executable",
                value: String::new(),
            });
        }
        Ok(())
    }

    pub fn build_backend(&self) -> Box<dyn SolverBackend> {
        match self.backend {
            BackendChoice::Native => Box::new(NativeBackend::new(self.gmin)),
            BackendChoice::Ngspice => Box::new(NgspiceBackend::new(self.ngspice.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{"busy_policy": "queue"}"#).unwrap();
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
        assert_eq!(config.backend, BackendChoice::Native);
        assert_eq!(config.ngspice.timeout_secs, 60);
        assert!(config.cache_results);
    }

    #[test]
    fn env_overrides_backend_and_executable() {
        let config = EngineConfig::default()
            .with_env_from(|key| match key {
                ENV_SOLVER => Some("NGSPICE".to_string()),
                ENV_NGSPICE => Some("/opt/ngspice/bin/ngspice".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.backend, BackendChoice::Ngspice);
        assert_eq!(config.ngspice.executable, "/opt/ngspice/bin/ngspice");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(EngineConfig::from_json_str(r#"{"gmin": -1.0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"backend": "spectre"}"#).is_err());
        assert!(EngineConfig::default()
            .with_env_from(|_| Some("spectre".to_string()))
            .is_err());
    }
}
