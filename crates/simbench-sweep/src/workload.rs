//! Workload command definitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simbench_core::{BenchmarkKind, RunConfiguration, SweepPoint};

/// File the workload may leave in its working directory with its own
/// timing figure (a single float, seconds).
pub const EMBEDDED_METRIC_FILE: &str = "embedded_timing.txt";

/// Selects the numba compilation target (`cuda` or `numba`).
pub const NUMBA_TARGET_ENV: &str = "MY_NUMBA_TARGET";
/// `1` enables fast-math in the workload.
pub const FASTMATH_ENV: &str = "FASTMATH";

/// One subprocess invocation: what to run, where, and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadCommand {
    /// Human-readable name used in logs and errors.
    pub name: String,

    /// Executable (the Python interpreter).
    pub program: PathBuf,

    pub args: Vec<String>,

    /// Working directory; always the extracted source tree.
    pub cwd: PathBuf,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,

    /// Receives both stdout and stderr. Truncated on every invocation.
    pub log_path: PathBuf,
}

impl WorkloadCommand {
    /// `python -m <module> -d <device> --fastmath <0|1> -l <nl> -t <nt> -s <steps>`
    pub fn sweep_point(
        python: &Path,
        source: &Path,
        config: &RunConfiguration,
        kind: BenchmarkKind,
        point: &SweepPoint,
        log_path: PathBuf,
    ) -> Self {
        let args = vec![
            "-m".to_string(),
            kind.module().to_string(),
            "-d".to_string(),
            config.device.to_string(),
            "--fastmath".to_string(),
            config.fast_math_flag().to_string(),
            "-l".to_string(),
            point.grid.longitudinal.to_string(),
            "-t".to_string(),
            point.grid.transversal.to_string(),
            "-s".to_string(),
            point.steps.to_string(),
        ];
        WorkloadCommand {
            name: format!("{} {}", kind.label(), config.describe(point)),
            program: python.to_path_buf(),
            args,
            cwd: source.to_path_buf(),
            env: workload_env(config),
            log_path,
        }
    }

    /// `python setup.py build_ext --inplace`, for devices that compile.
    pub fn compile(
        python: &Path,
        source: &Path,
        config: &RunConfiguration,
        log_path: PathBuf,
    ) -> Self {
        WorkloadCommand {
            name: format!("compile {}", config.device),
            program: python.to_path_buf(),
            args: vec![
                "setup.py".to_string(),
                "build_ext".to_string(),
                "--inplace".to_string(),
            ],
            cwd: source.to_path_buf(),
            env: workload_env(config),
            log_path,
        }
    }

    /// Where the workload would leave its embedded metric.
    pub fn embedded_metric_path(&self) -> PathBuf {
        self.cwd.join(EMBEDDED_METRIC_FILE)
    }
}

fn workload_env(config: &RunConfiguration) -> Vec<(String, String)> {
    vec![
        (NUMBA_TARGET_ENV.to_string(), config.device.to_string()),
        (
            FASTMATH_ENV.to_string(),
            config.fast_math_flag().to_string(),
        ),
    ]
}
