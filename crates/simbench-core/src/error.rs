//! Error taxonomy for a benchmark run.
//!
//! Every stage returns a typed error; the supervisor matches on
//! [`BenchError::stage`] to report where the run died and hands the error
//! to the recovery controller. Nothing in the core retries.

use std::path::PathBuf;

pub use source_resolver::VersionError;

/// Errors from the workspace manager.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("output directory already exists: {0}")]
    OutputExists(PathBuf),

    #[error("invalid archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("restore of {target} from {backup} failed: {source}")]
    Restore {
        target: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copy {from} -> {to} failed: {reason}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from result aggregation. Absent files are not errors;
/// present-but-malformed ones are.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("malformed timing file {path} (line {line}): {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for a run.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("workload invocation failed: {0}")]
    Invocation(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("run interrupted by signal")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Name of the failing stage, for the user-visible report.
    pub fn stage(&self) -> &'static str {
        match self {
            BenchError::InputValidation(_) => "input validation",
            BenchError::Version(_) => "version resolution",
            BenchError::Environment(_) => "environment check",
            BenchError::Invocation(_) | BenchError::Workspace(_) => "sweep",
            BenchError::Aggregation(_) => "aggregation",
            BenchError::Interrupted => "interrupted",
            BenchError::Io(_) => "io",
        }
    }

    /// Whether the run failed before any state was created.
    pub fn is_input_error(&self) -> bool {
        matches!(self, BenchError::InputValidation(_))
    }
}

/// Result type for simbench operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(
            BenchError::InputValidation("repeat".into()).stage(),
            "input validation"
        );
        assert_eq!(
            BenchError::Version(VersionError::Unresolvable("x".into())).stage(),
            "version resolution"
        );
        assert_eq!(BenchError::Invocation("exit 1".into()).stage(), "sweep");
        assert_eq!(
            BenchError::Workspace(WorkspaceError::AlreadyExists(PathBuf::from("/w"))).stage(),
            "sweep"
        );
        assert_eq!(BenchError::Interrupted.stage(), "interrupted");
    }

    #[test]
    fn test_restore_error_display() {
        let err = WorkspaceError::Restore {
            target: PathBuf::from("/w/source"),
            backup: PathBuf::from("/w/pristine"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/w/source"));
        assert!(msg.contains("/w/pristine"));
    }

    #[test]
    fn test_malformed_display() {
        let err = AggregationError::Malformed {
            path: PathBuf::from("init_bench.jsonl"),
            line: 3,
            reason: "expected value".into(),
        };
        assert!(err.to_string().contains("line 3"));
    }
}
