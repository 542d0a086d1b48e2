//! Provenance report written next to the results of every run.
//!
//! Plain text, one titled section per fact. Probes that fail record
//! `unavailable` instead of aborting the run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use source_resolver::DeviceKind;

use crate::fsutil::atomic_write;

pub const PROVENANCE_FILE: &str = "provenance.txt";

const MEMINFO_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    title: String,
    body: String,
}

/// Accumulates provenance sections in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceReport {
    sections: Vec<Section>,
}

impl ProvenanceReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&mut self, title: impl Into<String>, body: impl Into<String>) -> &mut Self {
        self.sections.push(Section {
            title: title.into(),
            body: body.into(),
        });
        self
    }

    /// Host inventory: kernel, CPU, memory and, for CUDA runs, the GPU.
    pub fn system(&mut self, device: DeviceKind) -> &mut Self {
        self.section("uname -a", read_stdout("uname", &["-a"]));
        self.section("lscpu", read_stdout("lscpu", &[]));
        self.section("/proc/meminfo", read_meminfo_head());
        if device == DeviceKind::Cuda {
            self.section("nvidia-smi", read_stdout("nvidia-smi", &[]));
        }
        self
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.body.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for s in &self.sections {
            let _ = writeln!(out, "== {} ==", s.title);
            let body = s.body.trim_end();
            if !body.is_empty() {
                let _ = writeln!(out, "{body}");
            }
            out.push('\n');
        }
        out
    }

    /// Write the report as `provenance.txt` in `dir`.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(PROVENANCE_FILE);
        atomic_write(&path, self.render().as_bytes())?;
        Ok(path)
    }
}

/// Stdout of a command, or `unavailable (...)` if it cannot run or fails.
pub fn read_stdout(program: &str, args: &[&str]) -> String {
    match Command::new(program).args(args).output() {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        Ok(out) => format!("unavailable ({program} exited with {})", out.status),
        Err(e) => format!("unavailable ({program}: {e})"),
    }
}

fn read_meminfo_head() -> String {
    match std::fs::read_to_string("/proc/meminfo") {
        Ok(content) => content
            .lines()
            .take(MEMINFO_LINES)
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("unavailable ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sections_in_order() {
        let mut report = ProvenanceReport::new();
        report
            .section("run id", "20261018_101500")
            .section("version", "v0.4.5");
        let text = report.render();
        let run = text.find("== run id ==").unwrap();
        let version = text.find("== version ==").unwrap();
        assert!(run < version);
        assert!(text.contains("v0.4.5\n"));
        assert_eq!(report.get("version"), Some("v0.4.5"));
    }

    #[test]
    fn test_missing_probe_is_unavailable() {
        let out = read_stdout("simbench-no-such-binary", &[]);
        assert!(out.starts_with("unavailable"));
    }

    #[test]
    fn test_system_sections_never_fail() {
        let mut report = ProvenanceReport::new();
        report.system(DeviceKind::Numba);
        assert!(report.get("uname -a").is_some());
        assert!(report.get("nvidia-smi").is_none());
        report.system(DeviceKind::Cuda);
        assert!(report.get("nvidia-smi").is_some());
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut report = ProvenanceReport::new();
        report.section("args", "simbench --device cuda");
        let path = report.write_to(dir.path()).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("--device cuda"));
    }
}
