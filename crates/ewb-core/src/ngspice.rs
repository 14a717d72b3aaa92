//! ngspice process backend
//!
//! The deck is written to a temporary file and ngspice runs in batch mode with
//! an ASCII rawfile. Deck, rawfile and captured output are `tempfile` handles,
//! so they are removed on every exit path including a crashed or killed child.

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::backend::{CancelToken, RawOutput, SolveRequest, SolverBackend, SolverFailure};
use crate::config::NgspiceConfig;
use crate::raw::parse_rawfile;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Default)]
pub struct NgspiceBackend {
    config: NgspiceConfig,
}

impl NgspiceBackend {
    pub fn new(config: NgspiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NgspiceConfig {
        &self.config
    }

    /// Whether the configured executable answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl SolverBackend for NgspiceBackend {
    fn name(&self) -> &'static str {
        "ngspice"
    }

    fn solve(
        &mut self,
        request: &SolveRequest,
        cancel: &CancelToken,
    ) -> Result<RawOutput, SolverFailure> {
        let deck = request.netlist.to_spice(&request.analysis);
        debug!(%deck, "ngspice deck");

        let mut deck_file = NamedTempFile::new().map_err(temp_failure)?;
        deck_file.write_all(deck.as_bytes()).map_err(temp_failure)?;
        deck_file.flush().map_err(temp_failure)?;
        let raw_file = NamedTempFile::new().map_err(temp_failure)?;
        let mut stdout = tempfile::tempfile().map_err(temp_failure)?;
        let mut stderr = tempfile::tempfile().map_err(temp_failure)?;

        let child = Command::new(&self.config.executable)
            .arg("-b")
            .arg("-r")
            .arg(raw_file.path())
            .arg(deck_file.path())
            .env("SPICE_ASCIIRAWFILE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone().map_err(temp_failure)?))
            .stderr(Stdio::from(stderr.try_clone().map_err(temp_failure)?))
            .spawn()
            .map_err(|err| {
                SolverFailure::Unavailable(format!("{}: {}", self.config.executable, err))
            })?;
        info!(pid = child.id(), "ngspice started");

        let status = wait(child, Duration::from_secs(self.config.timeout_secs), cancel)?;
        let output = format!(
            "{}{}",
            read_back(&mut stderr),
            read_back(&mut stdout)
        );
        let output = output.trim().to_string();

        if !status.success() {
            warn!(%status, "ngspice failed");
            return Err(SolverFailure::Diagnostic(if output.is_empty() {
                format!("ngspice exited with {}", status)
            } else {
                output
            }));
        }

        let data = std::fs::read(raw_file.path()).map_err(temp_failure)?;
        if data.is_empty() {
            return Err(SolverFailure::Diagnostic(if output.is_empty() {
                "ngspice produced no output".to_string()
            } else {
                output
            }));
        }
        parse_rawfile(&data).map_err(|err| {
            SolverFailure::Diagnostic(format!("unreadable ngspice rawfile: {}", err))
        })
    }
}

/// Poll the child until it exits, times out or is cancelled. The child is
/// killed and reaped on the last two.
fn wait(mut child: Child, timeout: Duration, cancel: &CancelToken) -> Result<ExitStatus, SolverFailure> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if cancel.is_cancelled() {
                    kill(&mut child);
                    return Err(SolverFailure::Cancelled);
                }
                if started.elapsed() > timeout {
                    kill(&mut child);
                    return Err(SolverFailure::Timeout(timeout.as_secs()));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                kill(&mut child);
                return Err(SolverFailure::Diagnostic(err.to_string()));
            }
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(%err, "ngspice already gone");
    }
    let _ = child.wait();
}

fn read_back(file: &mut std::fs::File) -> String {
    let mut text = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let mut bytes = Vec::new();
        if file.read_to_end(&mut bytes).is_ok() {
            text = String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    text
}

fn temp_failure(err: std::io::Error) -> SolverFailure {
    SolverFailure::Unavailable(format!("temporary file: {}", err))
}
