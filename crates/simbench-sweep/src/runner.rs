//! Timed workload execution.

use crate::workload::WorkloadCommand;
use async_trait::async_trait;
use simbench_core::{BenchError, Measurement};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Result of one timed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRun {
    /// Exit code (None when killed by a signal).
    pub exit_code: Option<i32>,

    pub measurement: Measurement,
}

impl TimedRun {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Seam between the sweep driver and the subprocess. The driver never
/// spawns anything itself.
#[async_trait]
pub trait WorkloadInvoker: Send + Sync {
    /// Run the command to completion. A non-zero exit is an
    /// [`BenchError::Invocation`].
    async fn invoke(&self, command: &WorkloadCommand) -> Result<Measurement, BenchError>;
}

/// Spawns real subprocesses and times them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

#[async_trait]
impl WorkloadInvoker for ProcessInvoker {
    async fn invoke(&self, command: &WorkloadCommand) -> Result<Measurement, BenchError> {
        let run = run_timed(command).await?;
        if !run.passed() {
            return Err(BenchError::Invocation(format!(
                "{} exited with {} (log: {})",
                command.name,
                run.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                command.log_path.display()
            )));
        }
        Ok(run.measurement)
    }
}

/// Execute a command with stdout and stderr redirected to its log file.
///
/// Wall time comes from a monotonic clock; user and system time are the
/// change in `RUSAGE_CHILDREN` across the wait. Invocations must not
/// overlap for the CPU figures to be attributable.
pub async fn run_timed(command: &WorkloadCommand) -> Result<TimedRun, BenchError> {
    if let Some(parent) = command.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let stdout = std::fs::File::create(&command.log_path)?;
    let stderr = stdout.try_clone()?;

    let before = ChildCpuTime::now();
    let start = Instant::now();

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.cwd)
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            BenchError::Invocation(format!(
                "cannot spawn {}: {e}",
                command.program.display()
            ))
        })?;

    let status = child.wait().await?;
    let wall_seconds = start.elapsed().as_secs_f64();
    let after = ChildCpuTime::now();

    let measurement = Measurement {
        wall_seconds,
        user_seconds: (after.user - before.user).max(0.0),
        system_seconds: (after.system - before.system).max(0.0),
    };
    debug!(command = %command.name, status = %status, real = wall_seconds, "workload finished");

    Ok(TimedRun {
        exit_code: status.code(),
        measurement,
    })
}

/// Cumulative CPU time of waited-for children, in seconds.
#[derive(Debug, Clone, Copy, Default)]
struct ChildCpuTime {
    user: f64,
    system: f64,
}

impl ChildCpuTime {
    #[cfg(unix)]
    fn now() -> Self {
        // SAFETY: rusage is a plain-old-data struct; zeroing all bytes is a valid initial state.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: getrusage writes into a stack-allocated struct we own.
        let ret = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) };
        if ret != 0 {
            return Self::default();
        }
        ChildCpuTime {
            user: timeval_seconds(usage.ru_utime),
            system: timeval_seconds(usage.ru_stime),
        }
    }

    #[cfg(not(unix))]
    fn now() -> Self {
        Self::default()
    }
}

#[cfg(unix)]
fn timeval_seconds(tv: libc::timeval) -> f64 {
    tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn shell(dir: &TempDir, script: &str) -> WorkloadCommand {
        WorkloadCommand {
            name: "sh".to_string(),
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: dir.path().to_path_buf(),
            env: vec![("FASTMATH".to_string(), "1".to_string())],
            log_path: dir.path().join("logs/run.log"),
        }
    }

    #[test]
    fn test_timed_run_passed() {
        let run = TimedRun {
            exit_code: Some(0),
            measurement: Measurement::default(),
        };
        assert!(run.passed());
        let killed = TimedRun {
            exit_code: None,
            measurement: Measurement::default(),
        };
        assert!(!killed.passed());
    }

    #[tokio::test]
    async fn test_output_goes_to_log() {
        let dir = TempDir::new().unwrap();
        let cmd = shell(&dir, "echo out; echo err >&2; echo fm=$FASTMATH; pwd");
        let run = run_timed(&cmd).await.unwrap();
        assert!(run.passed());
        assert!(run.measurement.wall_seconds >= 0.0);
        let log = std::fs::read_to_string(&cmd.log_path).unwrap();
        assert!(log.contains("out"));
        assert!(log.contains("err"));
        assert!(log.contains("fm=1"));
    }

    #[tokio::test]
    async fn test_log_is_overwritten_not_appended() {
        let dir = TempDir::new().unwrap();
        run_timed(&shell(&dir, "echo first")).await.unwrap();
        let cmd = shell(&dir, "echo second");
        run_timed(&cmd).await.unwrap();
        let log = std::fs::read_to_string(&cmd.log_path).unwrap();
        assert!(!log.contains("first"));
        assert!(log.contains("second"));
    }

    #[tokio::test]
    async fn test_process_invoker_rejects_failure() {
        let dir = TempDir::new().unwrap();
        let err = ProcessInvoker
            .invoke(&shell(&dir, "exit 3"))
            .await
            .unwrap_err();
        match err {
            BenchError::Invocation(msg) => assert!(msg.contains("exited with 3")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_invocation_error() {
        let dir = TempDir::new().unwrap();
        let mut cmd = shell(&dir, "");
        cmd.program = PathBuf::from("/nonexistent/python");
        assert!(matches!(
            run_timed(&cmd).await,
            Err(BenchError::Invocation(_))
        ));
    }
}
