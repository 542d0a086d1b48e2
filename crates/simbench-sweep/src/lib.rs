//! simbench sweep - timed parameter sweeps of simulation workloads
//!
//! Provides the run supervisor that:
//! - Resolves and verifies the workload source version
//! - Compiles it once per benchmark kind where the device needs it
//! - Sweeps every (steps, grid pair, repetition) point under a timer
//! - Aggregates and publishes the timing documents, or recovers on failure

pub mod compile;
pub mod driver;
pub mod identity;
pub mod runner;
pub mod session;
pub mod workload;

// Re-export key types
pub use compile::prepare_baseline;
pub use driver::{take_embedded_metric, SweepDriver};
pub use identity::SweepIdentity;
pub use runner::{run_timed, ProcessInvoker, TimedRun, WorkloadInvoker};
pub use session::{
    Session, SessionFailure, SessionOptions, SessionOutcome, SourceConfig, SCRIPTS_TARGET,
};
pub use workload::{WorkloadCommand, EMBEDDED_METRIC_FILE};
