//! Timing records and the per-kind timing log.
//!
//! Each benchmark kind appends one JSON object per line to
//! `timings/<label>.jsonl`. Records are never rewritten except to splice
//! the embedded metric into the most recent one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::fsutil::atomic_write;

/// Extension of per-kind run logs.
pub const RUN_LOG_EXT: &str = "jsonl";
/// Suffix of per-kind compile timing files (before `.json`).
pub const COMPILE_SUFFIX: &str = "_compile";

/// Wall, user and system time of one invocation, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub wall_seconds: f64,
    pub user_seconds: f64,
    pub system_seconds: f64,
}

/// One timing record. `embedded` stays null unless the workload reported
/// its own figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    #[serde(rename = "config")]
    pub description: String,
    #[serde(rename = "run")]
    pub repetition: u32,
    #[serde(rename = "real")]
    pub wall_seconds: f64,
    #[serde(rename = "user")]
    pub user_seconds: f64,
    #[serde(rename = "sys")]
    pub system_seconds: f64,
    pub embedded: Option<f64>,
}

impl TimingRecord {
    pub fn new(description: impl Into<String>, repetition: u32, m: &Measurement) -> Self {
        TimingRecord {
            description: description.into(),
            repetition,
            wall_seconds: m.wall_seconds,
            user_seconds: m.user_seconds,
            system_seconds: m.system_seconds,
            embedded: None,
        }
    }
}

/// Append-only NDJSON log for one benchmark kind.
#[derive(Debug, Clone)]
pub struct TimingLog {
    path: PathBuf,
}

impl TimingLog {
    pub fn new(timings_dir: &Path, label: &str) -> Self {
        TimingLog {
            path: timings_dir.join(format!("{label}.{RUN_LOG_EXT}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record as one line and flush it to disk.
    pub fn append(&self, record: &TimingRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)
            .map_err(|e| BenchError::Invocation(format!("cannot encode timing record: {e}")))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Set `embedded` on the most recent record. The log is rewritten
    /// atomically; earlier records are untouched.
    pub fn patch_last_embedded(&self, value: f64) -> Result<TimingRecord> {
        let text = fs::read_to_string(&self.path)?;
        let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let last = lines.pop().ok_or_else(|| {
            BenchError::Invocation(format!(
                "no timing record to attach embedded metric to in {}",
                self.path.display()
            ))
        })?;
        let mut record: TimingRecord = serde_json::from_str(last).map_err(|e| {
            BenchError::Invocation(format!("corrupt timing record in {}: {e}", self.path.display()))
        })?;
        record.embedded = Some(value);
        let patched = serde_json::to_string(&record)
            .map_err(|e| BenchError::Invocation(format!("cannot encode timing record: {e}")))?;

        let mut out = String::with_capacity(text.len() + 16);
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&patched);
        out.push('\n');
        atomic_write(&self.path, out.as_bytes())?;
        Ok(record)
    }

    /// Read back every record. A missing log reads as empty.
    pub fn read_all(&self) -> Result<Vec<TimingRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|e| {
                    BenchError::Invocation(format!(
                        "corrupt timing record in {}: {e}",
                        self.path.display()
                    ))
                })
            })
            .collect()
    }
}

/// Path of the compile timing file for a label.
pub fn compile_timing_path(timings_dir: &Path, label: &str) -> PathBuf {
    timings_dir.join(format!("{label}{COMPILE_SUFFIX}.json"))
}

/// Write the compile-phase measurement for a kind as a standalone document.
pub fn write_compile_timing(
    timings_dir: &Path,
    label: &str,
    record: &TimingRecord,
) -> Result<PathBuf> {
    let path = compile_timing_path(timings_dir, label);
    let json = serde_json::to_vec_pretty(record)
        .map_err(|e| BenchError::Invocation(format!("cannot encode compile timing: {e}")))?;
    atomic_write(&path, &json)?;
    Ok(path)
}
