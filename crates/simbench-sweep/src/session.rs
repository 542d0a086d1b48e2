//! Run supervisor.
//!
//! Owns the end-to-end flow of one run: environment check, version
//! resolution, workspace preparation, per-kind compile and sweep,
//! aggregation and publication. Any error (or the shutdown future firing)
//! ends the run through the recovery controller.
//!
//! The shutdown future is polled only while the run is parked at an
//! `.await`: a workload or compile child, or a download. Extraction,
//! restores and publication are blocking filesystem work on the run's own
//! task, so an interrupt that lands during one is acted on once it
//! finishes. Recovery therefore never renames or purges a tree that is
//! still being written.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use simbench_core::fsutil::copy_tree;
use simbench_core::{
    aggregate, emit_run_finished, emit_run_started, recover, AggregatedResults, BackupHandle,
    BackupSlot, BenchError, BenchmarkKind, Progress, ProvenanceReport, PythonEnvironment,
    RecoveryReport, Result, RunConfiguration, RunContext, RunSpan, SourceDistribution, Workspace,
    DEFAULT_FAILURE_TAG,
};
use source_resolver::{Fetcher, KnownDigests, Resolver, UpstreamConfig};
use tracing::{info, warn, Instrument};

use crate::compile::prepare_baseline;
use crate::driver::SweepDriver;
use crate::identity::SweepIdentity;
use crate::runner::WorkloadInvoker;

/// Directory inside the source tree that receives overlaid helper scripts.
pub const SCRIPTS_TARGET: &str = "examples";

/// Caller-supplied options that are not part of the run configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub output_root: PathBuf,
    pub scratch_root: PathBuf,
    /// `latest`, a published tag, or a local archive path.
    pub version: String,
    pub force_label: Option<String>,
    /// Virtualenv directory or interpreter path.
    pub python: Option<PathBuf>,
    /// Helper scripts copied into the source tree before the pristine
    /// snapshot.
    pub scripts_dir: Option<PathBuf>,
    pub retain_scratch: bool,
    pub failure_tag: String,
    pub show_progress: bool,
    /// Command line as invoked, for provenance.
    pub invocation: Vec<String>,
}

impl SessionOptions {
    pub fn new(output_root: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>) -> Self {
        SessionOptions {
            output_root: output_root.into(),
            scratch_root: scratch_root.into(),
            version: source_resolver::LATEST.to_string(),
            force_label: None,
            python: None,
            scripts_dir: None,
            retain_scratch: false,
            failure_tag: DEFAULT_FAILURE_TAG.to_string(),
            show_progress: false,
            invocation: Vec::new(),
        }
    }
}

/// Where source archives come from and which digests are trusted.
#[derive(Clone)]
pub struct SourceConfig {
    pub known: KnownDigests,
    pub upstream: UpstreamConfig,
    pub fetcher: Arc<dyn Fetcher>,
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub version_label: String,
    pub sweep_digest: String,
    pub points: u64,
    pub results: AggregatedResults,
}

/// A failed run, after recovery has been applied.
#[derive(Debug, thiserror::Error)]
#[error("run {run_id} failed during {stage}: {error}", stage = .error.stage())]
pub struct SessionFailure {
    pub run_id: String,
    #[source]
    pub error: BenchError,
    pub recovery: RecoveryReport,
}

/// Supervises one run.
pub struct Session {
    config: RunConfiguration,
    options: SessionOptions,
    sources: SourceConfig,
    invoker: Arc<dyn WorkloadInvoker>,
    environment: Option<PythonEnvironment>,
}

impl Session {
    pub fn new(
        config: RunConfiguration,
        options: SessionOptions,
        sources: SourceConfig,
        invoker: Arc<dyn WorkloadInvoker>,
    ) -> Self {
        Session {
            config,
            options,
            sources,
            invoker,
            environment: None,
        }
    }

    /// Use an already probed environment instead of probing at run start.
    pub fn with_environment(mut self, environment: PythonEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Run to completion, or until `shutdown` resolves. Either way the
    /// filesystem is left in a recoverable state.
    pub async fn run<F>(self, shutdown: F) -> std::result::Result<SessionOutcome, SessionFailure>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut ctx = RunContext::new(
            self.config.clone(),
            &self.options.output_root,
            &self.options.scratch_root,
            Local::now(),
        )
        .with_retain_scratch(self.options.retain_scratch)
        .with_failure_tag(self.options.failure_tag.clone());

        let run_id = ctx.run_id.clone();
        let run_span = RunSpan::new(&run_id);
        let result = tokio::select! {
            r = self.execute(&mut ctx).instrument(run_span.span().clone()) => r,
            _ = shutdown => {
                warn!(run_id = %run_id, "interrupted, aborting run");
                Err(BenchError::Interrupted)
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let _entered = run_span.enter();
        match result {
            Ok(outcome) => {
                emit_run_finished(&run_id, duration_ms, true);
                Ok(outcome)
            }
            Err(error) => {
                let recovery = recover(&mut ctx, &error);
                emit_run_finished(&run_id, duration_ms, false);
                Err(SessionFailure {
                    run_id,
                    error,
                    recovery,
                })
            }
        }
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<SessionOutcome> {
        let device = ctx.config.device;
        let environment = match &self.environment {
            Some(env) => env.clone(),
            None => PythonEnvironment::probe(self.options.python.as_deref())?,
        };

        let workspace = ctx.create_workspace()?;
        let resolver = Resolver::new(
            self.sources.known.clone(),
            self.sources.upstream.clone(),
            self.sources.fetcher.clone(),
            workspace.layout().downloads(),
        );
        let dist = resolver
            .resolve(
                &self.options.version,
                device,
                self.options.force_label.as_deref(),
            )
            .await?;
        let version_label = dist.version_label();
        emit_run_started(&ctx.run_id, device.as_str(), &version_label);

        ctx.create_output_dir()?;
        let identity = SweepIdentity::new(&ctx.config);
        self.provenance(ctx, &environment, &dist, &identity)
            .write_to(&ctx.output_dir)?;

        workspace.prepare(&dist.location)?;
        if let Some(scripts) = &self.options.scripts_dir {
            let copied = workspace.overlay(scripts, Path::new(SCRIPTS_TARGET))?;
            info!(copied, "helper scripts overlaid");
        }
        let pristine = workspace.snapshot(BackupSlot::Pristine)?;

        let repeat = ctx.config.repeat_count;
        let total: u64 = identity
            .kinds
            .iter()
            .map(|k| ctx.config.axes_for(*k).point_count(repeat))
            .sum();
        ctx.progress = Progress::new(total);

        let mut driver = SweepDriver::new(self.invoker.clone(), &environment.interpreter);
        if self.options.show_progress {
            driver = driver.with_progress_bar(total);
        }
        let points = match sweep_all(&driver, ctx, &workspace, &pristine, &identity.kinds).await {
            Ok(points) => {
                driver.finish();
                points
            }
            Err(e) => {
                driver.abandon();
                return Err(e);
            }
        };

        let layout = workspace.layout();
        let results = aggregate(&layout.timings(), device)?;
        let (compile_doc, run_doc) = results.write_to(&ctx.output_dir)?;
        copy_tree(&layout.logs(), &ctx.output_dir.join("logs"))?;
        copy_tree(&layout.timings(), &ctx.output_dir.join("timings"))?;
        info!(
            compile = %compile_doc.display(),
            run = %run_doc.display(),
            "results published"
        );

        if !ctx.retain_scratch {
            workspace.remove()?;
        }

        Ok(SessionOutcome {
            run_id: ctx.run_id.clone(),
            output_dir: ctx.output_dir.clone(),
            version_label,
            sweep_digest: identity.digest,
            points,
            results,
        })
    }

    fn provenance(
        &self,
        ctx: &RunContext,
        environment: &PythonEnvironment,
        dist: &SourceDistribution,
        identity: &SweepIdentity,
    ) -> ProvenanceReport {
        let trust = match dist.trusted_tag() {
            Some(tag) => format!("pinned release {tag}"),
            None if dist.is_trusted() => "upstream head".to_string(),
            None => "custom (force label)".to_string(),
        };
        let config = serde_json::to_string_pretty(&ctx.config)
            .unwrap_or_else(|e| format!("unavailable ({e})"));

        let mut report = ProvenanceReport::new();
        report
            .section("command line", self.options.invocation.join(" "))
            .section("run id", ctx.run_id.as_str())
            .section("version", dist.version_label())
            .section("source digest", dist.digest.to_hex())
            .section("source origin", dist.origin.as_str())
            .section("trust", trust)
            .section("sweep identity", identity.digest.as_str())
            .section("configuration", config)
            .section("python environment", environment.identity.as_str())
            .section(
                "python interpreter",
                format!(
                    "{} ({})",
                    environment.interpreter.display(),
                    environment.version_text
                ),
            )
            .section("pip list", environment.installed_packages())
            .system(ctx.config.device);
        report
    }
}

async fn sweep_all(
    driver: &SweepDriver,
    ctx: &mut RunContext,
    workspace: &Workspace,
    pristine: &BackupHandle,
    kinds: &[BenchmarkKind],
) -> Result<u64> {
    let mut points = 0;
    for &kind in kinds {
        let baseline = prepare_baseline(
            driver.invoker(),
            workspace,
            pristine,
            driver.python(),
            &ctx.config,
            kind,
        )
        .await?;
        points += driver.run_kind(ctx, workspace, kind, &baseline).await?;
    }
    Ok(points)
}
