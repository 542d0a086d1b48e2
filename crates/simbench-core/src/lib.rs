//! simbench Core Library
//!
//! Building blocks shared by the sweep driver and the CLI: run
//! configuration, workspace management, timing logs, aggregation,
//! recovery, environment probing and provenance.

pub mod aggregate;
pub mod context;
pub mod domain;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod obs;
pub mod provenance;
pub mod recovery;
pub mod telemetry;
pub mod timing;
pub mod workspace;

pub use aggregate::{aggregate, AggregatedResults, COMPILE_DOCUMENT, RUN_DOCUMENT};
pub use context::{run_id_for, Progress, RunContext, DEFAULT_FAILURE_TAG};
pub use domain::{BenchmarkKind, GridPair, RunConfiguration, SweepAxes, SweepPoint};
pub use environment::{PythonEnvironment, MIN_PYTHON};
pub use error::{AggregationError, BenchError, Result, WorkspaceError};
pub use provenance::{ProvenanceReport, PROVENANCE_FILE};
pub use recovery::{recover, RecoveryReport};
pub use telemetry::init_tracing;
pub use timing::{Measurement, TimingLog, TimingRecord};
pub use workspace::{BackupHandle, BackupSlot, Workspace, WorkspaceLayout};

pub use obs::{
    emit_compile_finished, emit_point_finished, emit_recovery_applied, emit_run_failed,
    emit_run_finished, emit_run_started, emit_sweep_finished, RunSpan,
};

pub use source_resolver::{
    ArchiveDigest, CompatFamily, DeviceKind, SourceDistribution, Trust, VersionError,
};
