//! Per-run context: identity, paths, progress and recovery state.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::domain::RunConfiguration;
use crate::error::WorkspaceError;
use crate::fsutil::create_fresh_dir;
use crate::workspace::{Workspace, WorkspaceLayout};

/// Tag appended to directories left behind by a failed run.
pub const DEFAULT_FAILURE_TAG: &str = "FAILED";

/// Monotone progress counter over a precomputed total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Progress {
            completed: 0,
            total,
        }
    }

    pub fn advance(&mut self) {
        self.completed += 1;
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

/// Everything the stages of one run share. Created once at run start.
///
/// The workspace and output directories are only ever created through
/// [`RunContext::create_workspace`] and [`RunContext::create_output_dir`],
/// which record that this run owns them. Recovery touches nothing else.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub config: RunConfiguration,
    pub workspace_root: PathBuf,
    pub output_dir: PathBuf,
    pub retain_scratch: bool,
    pub failure_tag: String,
    pub progress: Progress,
    owns_workspace: bool,
    owns_output: bool,
    recovered: bool,
}

impl RunContext {
    /// Build a context for a run starting at `started`.
    ///
    /// Workspace: `<scratch>/simbench_<device>_<run_id>`.
    /// Output: `<output>/simbench_<device>_<run_id>`.
    pub fn new(
        config: RunConfiguration,
        output_root: &Path,
        scratch_root: &Path,
        started: DateTime<Local>,
    ) -> Self {
        let run_id = run_id_for(started);
        let name = format!("simbench_{}_{run_id}", config.device);
        let workspace_root = scratch_root.join(&name);
        let output_dir = output_root.join(name);
        RunContext {
            run_id,
            config,
            workspace_root,
            output_dir,
            retain_scratch: false,
            failure_tag: DEFAULT_FAILURE_TAG.to_string(),
            progress: Progress::default(),
            owns_workspace: false,
            owns_output: false,
            recovered: false,
        }
    }

    pub fn with_retain_scratch(mut self, retain: bool) -> Self {
        self.retain_scratch = retain;
        self
    }

    pub fn with_failure_tag(mut self, tag: impl Into<String>) -> Self {
        self.failure_tag = tag.into();
        self
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.workspace_root)
    }

    /// Create this run's workspace. A root left by another run is an
    /// error and stays foreign.
    pub fn create_workspace(&mut self) -> Result<Workspace, WorkspaceError> {
        let workspace = Workspace::create(&self.workspace_root)?;
        self.owns_workspace = true;
        Ok(workspace)
    }

    /// Create this run's output directory, refusing one that already exists.
    pub fn create_output_dir(&mut self) -> Result<(), WorkspaceError> {
        match create_fresh_dir(&self.output_dir) {
            Ok(()) => {
                self.owns_output = true;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(WorkspaceError::OutputExists(self.output_dir.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn owns_workspace(&self) -> bool {
        self.owns_workspace
    }

    pub fn owns_output(&self) -> bool {
        self.owns_output
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub(crate) fn mark_recovered(&mut self) {
        self.recovered = true;
    }
}

/// Run identifier: local start time as `YYYYMMDD_HHMMSS`.
pub fn run_id_for(started: DateTime<Local>) -> String {
    started.format("%Y%m%d_%H%M%S").to_string()
}
