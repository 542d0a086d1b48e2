//! Compile phase for devices that build native extensions.
//!
//! For cython the source tree is built once per benchmark kind from the
//! pristine snapshot, the build is timed, and the built tree becomes the
//! baseline every sweep iteration is restored from. Other devices sweep
//! straight from pristine.

use crate::runner::WorkloadInvoker;
use crate::workload::WorkloadCommand;
use simbench_core::timing::write_compile_timing;
use simbench_core::{
    emit_compile_finished, BackupHandle, BackupSlot, BenchmarkKind, Result, RunConfiguration,
    TimingRecord, Workspace,
};
use std::path::Path;
use tracing::info;

/// Name of the compile log inside each kind's log directory.
pub const COMPILE_LOG: &str = "compile.log";

/// Produce the snapshot the sweep for `kind` restores from.
pub async fn prepare_baseline(
    invoker: &dyn WorkloadInvoker,
    workspace: &Workspace,
    pristine: &BackupHandle,
    python: &Path,
    config: &RunConfiguration,
    kind: BenchmarkKind,
) -> Result<BackupHandle> {
    workspace.restore(pristine)?;
    if !config.device.needs_build() {
        return Ok(pristine.clone());
    }

    let layout = workspace.layout();
    let label = kind.label();
    let command = WorkloadCommand::compile(
        python,
        &workspace.source(),
        config,
        layout.logs_for(label).join(COMPILE_LOG),
    );
    info!(kind = label, "compiling extensions");
    let measurement = invoker.invoke(&command).await?;
    let record = TimingRecord::new(format!("compile device={}", config.device), 1, &measurement);
    write_compile_timing(&layout.timings(), label, &record)?;
    emit_compile_finished(label, measurement.wall_seconds);

    Ok(workspace.snapshot(BackupSlot::Baseline)?)
}
