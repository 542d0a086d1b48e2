//! Workspace manager: extracted source tree, backups, logs and timings.
//!
//! Layout under `<scratch>/simbench_<run_id>/`:
//!
//! ```text
//! downloads/          fetched archives
//! source/             working tree the workload runs in
//! pristine/           snapshot of the freshly extracted tree
//! baseline/           snapshot the sweep restores from (post-compile for cython)
//! output/<label>/     per-iteration workload logs
//! timings/            <label>.jsonl and <label>_compile.json
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::WorkspaceError;
use crate::fsutil::{copy_tree, create_fresh_dir, remove_tree, sync_barrier};

type Result<T> = std::result::Result<T, WorkspaceError>;

/// Path arithmetic for a workspace root. Creates nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WorkspaceLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn downloads(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn source(&self) -> PathBuf {
        self.root.join("source")
    }

    pub fn slot(&self, slot: BackupSlot) -> PathBuf {
        self.root.join(slot.dir_name())
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn logs_for(&self, label: &str) -> PathBuf {
        self.logs().join(label)
    }

    pub fn timings(&self) -> PathBuf {
        self.root.join("timings")
    }

    /// Bulky subtrees deleted on failure unless scratch is retained.
    pub fn scratch_trees(&self) -> Vec<PathBuf> {
        vec![
            self.source(),
            self.slot(BackupSlot::Pristine),
            self.slot(BackupSlot::Baseline),
            self.downloads(),
        ]
    }
}

/// Which backup a snapshot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSlot {
    /// The tree exactly as extracted, plus overlaid scripts.
    Pristine,
    /// The tree every sweep iteration starts from.
    Baseline,
}

impl BackupSlot {
    fn dir_name(&self) -> &'static str {
        match self {
            BackupSlot::Pristine => "pristine",
            BackupSlot::Baseline => "baseline",
        }
    }
}

/// Handle to a completed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub slot: BackupSlot,
    pub path: PathBuf,
}

/// Owns the on-disk workspace of one run.
#[derive(Debug)]
pub struct Workspace {
    layout: WorkspaceLayout,
}

impl Workspace {
    /// Create a fresh workspace. Fails if the root already exists so two
    /// runs never share state; the check and the creation are one
    /// `mkdir`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = WorkspaceLayout::new(root);
        match create_fresh_dir(layout.root()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::AlreadyExists(layout.root().to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(layout.downloads())?;
        fs::create_dir_all(layout.logs())?;
        fs::create_dir_all(layout.timings())?;
        info!(root = %layout.root().display(), "workspace created");
        Ok(Workspace { layout })
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn source(&self) -> PathBuf {
        self.layout.source()
    }

    /// Extract the archive into `source/`, stripping a single wrapper
    /// directory if the archive has one. Returns the source tree path.
    pub fn prepare(&self, archive: &Path) -> Result<PathBuf> {
        let source = self.layout.source();
        remove_tree(&source)?;
        fs::create_dir_all(&source)?;
        let files = extract_zip(archive, &source)?;
        info!(archive = %archive.display(), files, "source tree extracted");
        Ok(source)
    }

    /// Copy helper scripts into `source/<relative>`. A missing scripts
    /// directory is not an error.
    pub fn overlay(&self, scripts: &Path, relative: &Path) -> Result<usize> {
        if !scripts.is_dir() {
            debug!(scripts = %scripts.display(), "no helper scripts to overlay");
            return Ok(0);
        }
        let target = self.layout.source().join(relative);
        copy_tree(scripts, &target).map_err(|e| WorkspaceError::Copy {
            from: scripts.to_path_buf(),
            to: target.clone(),
            reason: e.to_string(),
        })
    }

    /// Snapshot the current source tree into a backup slot, replacing any
    /// earlier snapshot in that slot.
    pub fn snapshot(&self, slot: BackupSlot) -> Result<BackupHandle> {
        let source = self.layout.source();
        let path = self.layout.slot(slot);
        remove_tree(&path)?;
        copy_tree(&source, &path).map_err(|e| WorkspaceError::Copy {
            from: source.clone(),
            to: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(slot = slot.dir_name(), "snapshot taken");
        Ok(BackupHandle { slot, path })
    }

    /// Replace the source tree with a copy of the backup, then issue a
    /// filesystem sync. Idempotent: restoring twice leaves the same tree.
    pub fn restore(&self, handle: &BackupHandle) -> Result<()> {
        let source = self.layout.source();
        let restore_err = |source_err: io::Error| WorkspaceError::Restore {
            target: self.layout.source(),
            backup: handle.path.clone(),
            source: source_err,
        };
        if !handle.path.is_dir() {
            return Err(restore_err(io::Error::new(
                io::ErrorKind::NotFound,
                "backup missing",
            )));
        }
        remove_tree(&source).map_err(restore_err)?;
        copy_tree(&handle.path, &source).map_err(restore_err)?;
        sync_barrier();
        Ok(())
    }

    /// Delete source and backups, keeping logs and timings.
    pub fn purge_scratch(&self) -> Result<Vec<PathBuf>> {
        let mut purged = Vec::new();
        for tree in self.layout.scratch_trees() {
            if remove_tree(&tree)? {
                purged.push(tree);
            }
        }
        Ok(purged)
    }

    /// Remove the whole workspace after a successful publication.
    pub fn remove(self) -> Result<()> {
        remove_tree(self.layout.root())?;
        info!(root = %self.layout.root().display(), "workspace removed");
        Ok(())
    }
}

/// Extract a zip archive into `dest`. A single top-level directory that
/// contains every entry is stripped. Returns the number of files written.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let archive_err = |reason: String| WorkspaceError::Archive {
        path: archive.to_path_buf(),
        reason,
    };
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i).map_err(|e| archive_err(e.to_string()))?;
        let name = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| archive_err(format!("unsafe entry path '{}'", entry.name())))?;
        names.push(name);
    }
    if names.is_empty() {
        return Err(archive_err("archive is empty".into()));
    }

    let wrapper = wrapper_dir(&names);
    let mut written = 0;
    for (i, name) in names.iter().enumerate() {
        let rel = match &wrapper {
            Some(w) => name.strip_prefix(w).unwrap_or(name),
            None => name.as_path(),
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(rel);
        let mut entry = zip.by_index(i).map_err(|e| archive_err(e.to_string()))?;
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut target = fs::File::create(&out)?;
        io::copy(&mut entry, &mut target)?;
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out, fs::Permissions::from_mode(mode))?;
        }
        written += 1;
    }
    Ok(written)
}

fn wrapper_dir(names: &[PathBuf]) -> Option<PathBuf> {
    let tops: BTreeSet<_> = names
        .iter()
        .filter_map(|n| match n.components().next() {
            Some(Component::Normal(c)) => Some(c.to_os_string()),
            _ => None,
        })
        .collect();
    let nested = names.iter().any(|n| n.components().count() > 1);
    if tops.len() == 1 && nested {
        tops.into_iter().next().map(PathBuf::from)
    } else {
        None
    }
}
