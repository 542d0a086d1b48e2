//! Sweep driver: one benchmark kind across its configuration matrix.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use simbench_core::{
    emit_point_finished, emit_sweep_finished, BackupHandle, BenchError, BenchmarkKind, Result,
    RunContext, TimingLog, TimingRecord, Workspace,
};
use tracing::{debug, info};

use crate::runner::WorkloadInvoker;
use crate::workload::WorkloadCommand;

/// Drives sweep points through a [`WorkloadInvoker`]. Sequential, no
/// retries: the first failure aborts the sweep.
pub struct SweepDriver {
    invoker: Arc<dyn WorkloadInvoker>,
    python: PathBuf,
    progress: ProgressBar,
}

impl SweepDriver {
    pub fn new(invoker: Arc<dyn WorkloadInvoker>, python: impl Into<PathBuf>) -> Self {
        SweepDriver {
            invoker,
            python: python.into(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a terminal progress bar over `total` points.
    pub fn with_progress_bar(mut self, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.progress = pb;
        self
    }

    pub fn invoker(&self) -> &dyn WorkloadInvoker {
        self.invoker.as_ref()
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Run every point of `kind`. Each iteration starts from `baseline`;
    /// the tree is restored after every invocation.
    pub async fn run_kind(
        &self,
        ctx: &mut RunContext,
        workspace: &Workspace,
        kind: BenchmarkKind,
        baseline: &BackupHandle,
    ) -> Result<u64> {
        let started = Instant::now();
        let label = kind.label();
        let layout = workspace.layout();
        let log_dir = layout.logs_for(label);
        std::fs::create_dir_all(&log_dir)?;
        let timing_log = TimingLog::new(&layout.timings(), label);
        let axes = ctx.config.axes_for(kind);
        let repeat = ctx.config.repeat_count;

        info!(
            kind = label,
            points = axes.point_count(repeat),
            "sweep started"
        );

        let mut done = 0u64;
        for point in axes.points(repeat) {
            let description = ctx.config.describe(&point);
            self.progress.set_message(format!("{label} {description}"));

            let command = WorkloadCommand::sweep_point(
                &self.python,
                &workspace.source(),
                &ctx.config,
                kind,
                &point,
                log_dir.join(ctx.config.log_file_name(&point)),
            );
            let measurement = self.invoker.invoke(&command).await?;
            let mut record = TimingRecord::new(description.clone(), point.repetition, &measurement);
            timing_log.append(&record)?;

            if let Some(value) = take_embedded_metric(&command.embedded_metric_path())? {
                record = timing_log.patch_last_embedded(value)?;
                debug!(embedded = value, "embedded metric recorded");
            }

            workspace.restore(baseline)?;

            ctx.progress.advance();
            self.progress.inc(1);
            done += 1;
            emit_point_finished(
                label,
                &record.description,
                record.repetition,
                record.wall_seconds,
                ctx.progress.percent(),
            );
        }

        emit_sweep_finished(label, done, started.elapsed().as_millis() as u64);
        Ok(done)
    }

    pub fn finish(&self) {
        self.progress.finish_with_message("Complete");
    }

    pub fn abandon(&self) {
        self.progress.abandon();
    }
}

/// Read and delete the workload's embedded metric, if it left one.
/// A file that does not hold a single finite number fails the invocation;
/// NaN and infinities have no JSON form and would be recorded as null.
pub fn take_embedded_metric(path: &Path) -> Result<Option<f64>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: f64 = text.trim().parse().map_err(|e| {
        BenchError::Invocation(format!(
            "embedded metric in {} is not a number ({:?}): {e}",
            path.display(),
            text.trim()
        ))
    })?;
    if !value.is_finite() {
        return Err(BenchError::Invocation(format!(
            "embedded metric in {} is not finite: {value}",
            path.display()
        )));
    }
    std::fs::remove_file(path)?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_take_embedded_metric() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embedded_timing.txt");
        assert_eq!(take_embedded_metric(&path).unwrap(), None);

        std::fs::write(&path, "  12.5\n").unwrap();
        assert_eq!(take_embedded_metric(&path).unwrap(), Some(12.5));
        assert!(!path.exists());
    }

    #[test]
    fn test_take_embedded_metric_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embedded_timing.txt");
        std::fs::write(&path, "fast").unwrap();
        assert!(matches!(
            take_embedded_metric(&path),
            Err(BenchError::Invocation(_))
        ));
    }

    #[test]
    fn test_take_embedded_metric_rejects_non_finite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embedded_timing.txt");
        for text in ["NaN\n", "inf", "-infinity"] {
            std::fs::write(&path, text).unwrap();
            match take_embedded_metric(&path) {
                Err(BenchError::Invocation(msg)) => assert!(msg.contains("not finite"), "{msg}"),
                other => panic!("{text:?} accepted: {other:?}"),
            }
        }
    }
}
