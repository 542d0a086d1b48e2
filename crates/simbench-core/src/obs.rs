//! Structured observability hooks for simbench run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for key lifecycle events: start, point finished,
//!   sweep finished, run finished, failure and recovery
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! For JSON output, pass `--json` to the CLI.

use tracing::info;

/// The run-scoped tracing span, tagged with the run id.
///
/// One span per run covers both the async run body (via
/// [`RunSpan::span`] and `Instrument`) and the synchronous failure path
/// (via [`RunSpan::enter`]).
///
/// # Example
///
/// ```ignore
/// let run_span = RunSpan::new("20261018_101500");
/// execute().instrument(run_span.span().clone()).await;
/// let _entered = run_span.enter();
/// // Now all tracing calls are associated with run_id = "20261018_101500"
/// ```
#[derive(Debug, Clone)]
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("simbench.run", run_id = %run_id),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Enter the span until the guard drops. Not for holding across `.await`.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Emit event: run started for a device and resolved version.
pub fn emit_run_started(run_id: &str, device: &str, version_label: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        device = %device,
        version = %version_label,
    );
}

/// Emit event: one sweep point (one repetition) completed.
pub fn emit_point_finished(
    label: &str,
    config: &str,
    repetition: u32,
    wall_seconds: f64,
    percent: f64,
) {
    info!(
        event = "sweep.point_finished",
        kind = %label,
        config = %config,
        run = repetition,
        real = wall_seconds,
        progress = format!("{percent:.1}%"),
    );
}

/// Emit event: compile phase finished for a kind.
pub fn emit_compile_finished(label: &str, wall_seconds: f64) {
    info!(event = "compile.finished", kind = %label, real = wall_seconds);
}

/// Emit event: all points of one kind completed.
pub fn emit_sweep_finished(label: &str, points: u64, duration_ms: u64) {
    info!(
        event = "sweep.finished",
        kind = %label,
        points = points,
        duration_ms = duration_ms,
    );
}

/// Emit event: run finished with duration and success status.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: run failed in a stage (error level).
pub fn emit_run_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "run.failed", run_id = %run_id, stage = %stage, error = %error);
}

/// Emit event: recovery renamed or purged leftover state.
pub fn emit_recovery_applied(run_id: &str, tag: &str, renamed: usize, purged: usize) {
    tracing::warn!(
        event = "recovery.applied",
        run_id = %run_id,
        tag = %tag,
        renamed = renamed,
        purged = purged,
    );
}
