use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::CircuitError;

/// Lifecycle of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Building,
    Submitted,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RunState::Building | RunState::Submitted | RunState::Running
        )
    }

    pub fn can_transition(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle | Completed | Failed, Building | Submitted | Completed) => true,
            (Building, Submitted | Completed | Failed) => true,
            (Submitted, Running | Completed | Failed) => true,
            (Running, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Building => "building",
            RunState::Submitted => "submitted",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of the most recent run on an engine.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: RunState,
    pub run: u64,
    pub last_error: Option<CircuitError>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            run: 0,
            last_error: None,
        }
    }

    /// Start tracking run `run`.
    pub fn begin(&mut self, run: u64, state: RunState) {
        self.run = run;
        self.last_error = None;
        self.transition(state);
    }

    /// Move to `next`, ignoring illegal transitions.
    pub fn transition(&mut self, next: RunState) -> bool {
        if !self.state.can_transition(next) {
            warn!(run = self.run, from = %self.state, to = %next, "illegal run transition ignored");
            return false;
        }
        info!(run = self.run, from = %self.state, to = %next, "run state");
        self.state = next;
        true
    }

    pub fn fail(&mut self, error: CircuitError) {
        self.transition(RunState::Failed);
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_run_lifecycle() {
        let mut session = Session::new();
        session.begin(1, RunState::Building);
        assert!(session.transition(RunState::Submitted));
        assert!(session.transition(RunState::Running));
        assert!(session.transition(RunState::Completed));
        assert!(session.state.is_terminal());
    }

    #[test]
    fn rejects_skipping_back() {
        let mut session = Session::new();
        session.begin(1, RunState::Submitted);
        assert!(!session.transition(RunState::Building));
        assert_eq!(session.state, RunState::Submitted);
        session.fail(CircuitError::Cancelled);
        assert_eq!(session.state, RunState::Failed);
        assert_eq!(session.last_error, Some(CircuitError::Cancelled));
    }
}
