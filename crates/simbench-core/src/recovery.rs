//! Failure recovery: never delete evidence of a failed run.
//!
//! On any fatal error the supervisor calls [`recover`] once. Partial logs
//! and timings are salvaged into the output directory, bulky scratch
//! trees are purged unless retained, and both the workspace and the
//! output directory are renamed with the failure tag. Only directories
//! the run created itself are touched; a path that merely exists belongs
//! to someone else. Calling it again is a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::BenchError;
use crate::fsutil::{copy_tree, remove_tree};
use crate::obs;

/// What recovery did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// (old, new) directory names.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub purged: Vec<PathBuf>,
    /// Subtrees copied into the output directory.
    pub salvaged: Vec<PathBuf>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty() && self.purged.is_empty() && self.salvaged.is_empty()
    }

    /// New location of `path`, if it was renamed.
    pub fn renamed_to(&self, path: &Path) -> Option<&Path> {
        self.renamed
            .iter()
            .find(|(from, _)| from == path)
            .map(|(_, to)| to.as_path())
    }
}

/// Apply recovery for `error`. Best effort: individual failures are
/// logged and skipped so one bad path never hides the rest.
pub fn recover(ctx: &mut RunContext, error: &BenchError) -> RecoveryReport {
    let mut report = RecoveryReport::default();
    if ctx.is_recovered() {
        debug!(run_id = %ctx.run_id, "recovery already applied");
        return report;
    }
    ctx.mark_recovered();
    obs::emit_run_failed(&ctx.run_id, error.stage(), error);

    let layout = ctx.layout();
    let workspace = layout.root().to_path_buf();
    let output = ctx.output_dir.clone();
    let own_workspace = ctx.owns_workspace() && workspace.is_dir();
    let own_output = ctx.owns_output() && output.is_dir();

    if own_workspace && own_output {
        for (src, name) in [(layout.timings(), "timings"), (layout.logs(), "logs")] {
            if !src.is_dir() {
                continue;
            }
            let dest = output.join(name);
            match copy_tree(&src, &dest) {
                Ok(_) => report.salvaged.push(dest),
                Err(e) => warn!(from = %src.display(), error = %e, "could not salvage partial results"),
            }
        }
    }

    if own_workspace {
        if !ctx.retain_scratch {
            for tree in layout.scratch_trees() {
                match remove_tree(&tree) {
                    Ok(true) => report.purged.push(tree),
                    Ok(false) => {}
                    Err(e) => warn!(path = %tree.display(), error = %e, "could not purge scratch tree"),
                }
            }
        }
        rename_tagged(&workspace, &ctx.failure_tag, &mut report);
    }

    if own_output {
        rename_tagged(&output, &ctx.failure_tag, &mut report);
    }

    obs::emit_recovery_applied(
        &ctx.run_id,
        &ctx.failure_tag,
        report.renamed.len(),
        report.purged.len(),
    );
    report
}

fn rename_tagged(path: &Path, tag: &str, report: &mut RecoveryReport) {
    let target = tagged_path(path, tag);
    match fs::rename(path, &target) {
        Ok(()) => report.renamed.push((path.to_path_buf(), target)),
        Err(e) => warn!(path = %path.display(), error = %e, "could not tag failed directory"),
    }
}

/// `<path>_<tag>`, or `<path>_<tag>.N` for the first free N.
pub fn tagged_path(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = path.with_file_name(format!("{name}_{tag}"));
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| path.with_file_name(format!("{name}_{tag}.{n}")))
        .find(|p| !p.exists())
        .unwrap_or(base)
}
