//! Result aggregation: consolidate per-kind timing files into two
//! documents, `compile_timings.json` and `run_timings.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AggregationError;
use crate::fsutil::atomic_write;
use crate::timing::{TimingRecord, COMPILE_SUFFIX, RUN_LOG_EXT};
use source_resolver::DeviceKind;

pub const COMPILE_DOCUMENT: &str = "compile_timings.json";
pub const RUN_DOCUMENT: &str = "run_timings.json";

type Result<T> = std::result::Result<T, AggregationError>;

/// The two consolidated documents.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResults {
    /// `{ "<label>": <compile record>, ... }`; `{}` when nothing compiled.
    pub compile: Value,
    /// `{ "device": "<device>", "<label>": [<record>, ...], ... }`.
    pub run: Value,
}

impl AggregatedResults {
    /// Labels present in the run document.
    pub fn run_labels(&self) -> Vec<String> {
        self.run
            .as_object()
            .map(|o| o.keys().filter(|k| *k != "device").cloned().collect())
            .unwrap_or_default()
    }

    /// Write both documents into `dest`, returning their paths.
    pub fn write_to(&self, dest: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dest)?;
        let compile = dest.join(COMPILE_DOCUMENT);
        let run = dest.join(RUN_DOCUMENT);
        atomic_write(&compile, &serde_json::to_vec_pretty(&self.compile)?)?;
        atomic_write(&run, &serde_json::to_vec_pretty(&self.run)?)?;
        Ok((compile, run))
    }
}

/// Aggregate every timing file under `timings_dir`. A missing directory
/// yields empty but well-formed documents.
pub fn aggregate(timings_dir: &Path, device: DeviceKind) -> Result<AggregatedResults> {
    let files = sorted_files(timings_dir)?;
    let compile_ext = format!("{COMPILE_SUFFIX}.json");

    let mut compile = Map::new();
    for (name, path) in files.iter().filter(|(n, _)| n.ends_with(&compile_ext)) {
        let label = &name[..name.len() - compile_ext.len()];
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text).map_err(|e| malformed(path, e.line(), e))?;
        debug!(label, "compile timing aggregated");
        compile.insert(label.to_string(), value);
    }

    let run_ext = format!(".{RUN_LOG_EXT}");
    let mut run = Map::new();
    run.insert("device".into(), Value::String(device.to_string()));
    for (name, path) in files.iter().filter(|(n, _)| n.ends_with(&run_ext)) {
        let label = &name[..name.len() - run_ext.len()];
        let records = read_records(path)?;
        debug!(label, records = records.len(), "run timings aggregated");
        run.insert(label.to_string(), Value::Array(records));
    }

    Ok(AggregatedResults {
        compile: Value::Object(compile),
        run: Value::Object(run),
    })
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: TimingRecord =
            serde_json::from_str(line).map_err(|e| malformed(path, idx + 1, e))?;
        records.push(serde_json::to_value(record)?);
    }
    Ok(records)
}

fn sorted_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            files.push((name.to_string(), entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

fn malformed(path: &Path, line: usize, err: impl std::fmt::Display) -> AggregationError {
    AggregationError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: err.to_string(),
    }
}
