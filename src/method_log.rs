// SPDX-License-Identifier: AGPL-3.0-only

//! Explicit status-logging handle for periodic run status.
//!
//! There is no process-wide sink: the host constructs a [`MethodLog`]
//! and passes it into the run manager, which appends one JSON object per
//! status line at most every `log_frequency` seconds. Write failures are
//! reported once on stderr and do not disturb the run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Append-only JSON status log with a minimum interval between writes.
#[derive(Debug)]
pub struct MethodLog {
    path: PathBuf,
    /// Minimum seconds between status writes.
    pub log_frequency: f64,
    last_write: Option<Instant>,
    write_failed: bool,
}

impl MethodLog {
    /// Create a log writing to `path` at most every `log_frequency`
    /// seconds.
    #[must_use]
    pub fn new(path: &Path, log_frequency: f64) -> Self {
        Self {
            path: path.to_path_buf(),
            log_frequency,
            last_write: None,
            write_failed: false,
        }
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether enough wall time has passed for another status write.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.last_write
            .map_or(true, |t| t.elapsed().as_secs_f64() >= self.log_frequency)
    }

    /// Append one status line if the interval has elapsed. Returns
    /// whether a line was written.
    pub fn write_if_due(&mut self, status: &serde_json::Value) -> bool {
        if !self.is_due() {
            return false;
        }
        self.write(status);
        true
    }

    /// Append one status line unconditionally.
    pub fn write(&mut self, status: &serde_json::Value) {
        self.last_write = Some(Instant::now());
        let outcome = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{status}"));
        if let Err(err) = outcome {
            if !self.write_failed {
                eprintln!("status log write to {} failed: {err}", self.path.display());
                self.write_failed = true;
            }
        }
    }
}
